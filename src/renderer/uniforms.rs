//! Graphics-program uniform contract
//!
//! Uniforms are addressed by the fixed names the shader was written against.
//! A name that does not resolve yields [`UniformHandle::Inert`], and writes
//! through it are dropped without complaint.

use bytemuck::{Pod, Zeroable};

/// Uniform block shared by every sprite draw (must match `sprite_shader.wgsl`)
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Globals {
    pub model: [f32; 16],
    pub view: [f32; 16],
    pub projection: [f32; 16],
    pub time: f32,
    pub pulse: f32,
    pub touch_x: f32,
    pub touch_y: f32,
}

impl Default for Globals {
    fn default() -> Self {
        let identity = glam::Mat4::IDENTITY.to_cols_array();
        Self {
            model: identity,
            view: identity,
            projection: identity,
            time: 0.0,
            pulse: 0.0,
            touch_x: 0.0,
            touch_y: 0.0,
        }
    }
}

/// Resolved uniform location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformHandle {
    Model,
    View,
    Projection,
    Time,
    Pulse,
    TouchX,
    TouchY,
    /// Lookup failed; writes are discarded
    Inert,
}

impl UniformHandle {
    pub fn lookup(name: &str) -> Self {
        match name {
            "model" => Self::Model,
            "view" => Self::View,
            "projection" => Self::Projection,
            "uTime" => Self::Time,
            "uPulse" => Self::Pulse,
            "uTouchX" => Self::TouchX,
            "uTouchY" => Self::TouchY,
            _ => Self::Inert,
        }
    }
}

/// Handles looked up once at init
#[derive(Debug, Clone, Copy)]
pub struct UniformHandles {
    pub model: UniformHandle,
    pub view: UniformHandle,
    pub projection: UniformHandle,
    pub time: UniformHandle,
    pub pulse: UniformHandle,
    pub touch_x: UniformHandle,
    pub touch_y: UniformHandle,
}

impl UniformHandles {
    pub fn lookup() -> Self {
        Self {
            model: UniformHandle::lookup("model"),
            view: UniformHandle::lookup("view"),
            projection: UniformHandle::lookup("projection"),
            time: UniformHandle::lookup("uTime"),
            pulse: UniformHandle::lookup("uPulse"),
            touch_x: UniformHandle::lookup("uTouchX"),
            touch_y: UniformHandle::lookup("uTouchY"),
        }
    }
}

/// CPU copy of the uniform buffer with change tracking
#[derive(Debug, Clone, Default)]
pub struct UniformBlock {
    globals: Globals,
    dirty: bool,
}

impl UniformBlock {
    pub fn new() -> Self {
        Self {
            globals: Globals::default(),
            dirty: true,
        }
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Write a 4x4 column-major matrix; non-matrix handles ignore it
    pub fn set_mat4(&mut self, handle: UniformHandle, cols: [f32; 16]) {
        let slot = match handle {
            UniformHandle::Model => &mut self.globals.model,
            UniformHandle::View => &mut self.globals.view,
            UniformHandle::Projection => &mut self.globals.projection,
            _ => return,
        };
        if *slot != cols {
            *slot = cols;
            self.dirty = true;
        }
    }

    /// Write a scalar; non-scalar handles ignore it
    pub fn set_f32(&mut self, handle: UniformHandle, value: f32) {
        let slot = match handle {
            UniformHandle::Time => &mut self.globals.time,
            UniformHandle::Pulse => &mut self.globals.pulse,
            UniformHandle::TouchX => &mut self.globals.touch_x,
            UniformHandle::TouchY => &mut self.globals.touch_y,
            _ => return,
        };
        if *slot != value {
            *slot = value;
            self.dirty = true;
        }
    }

    /// Force a re-upload (fresh GPU buffer)
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Globals to upload if anything changed since the last call
    pub fn take_dirty(&mut self) -> Option<Globals> {
        if self.dirty {
            self.dirty = false;
            Some(self.globals)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals_size_is_uniform_aligned() {
        assert_eq!(std::mem::size_of::<Globals>() % 16, 0);
        assert_eq!(std::mem::size_of::<Globals>(), 208);
    }

    #[test]
    fn test_lookup_fixed_names() {
        assert_eq!(UniformHandle::lookup("projection"), UniformHandle::Projection);
        assert_eq!(UniformHandle::lookup("uPulse"), UniformHandle::Pulse);
        assert_eq!(UniformHandle::lookup("uColor"), UniformHandle::Inert);
    }

    #[test]
    fn test_inert_handle_discards_writes() {
        let mut block = UniformBlock::new();
        block.take_dirty();
        let before = *block.globals();

        block.set_f32(UniformHandle::Inert, 3.0);
        block.set_mat4(UniformHandle::Inert, [2.0; 16]);
        assert_eq!(*block.globals(), before);
        assert!(block.take_dirty().is_none());
    }

    #[test]
    fn test_kind_mismatch_is_ignored() {
        let mut block = UniformBlock::new();
        block.take_dirty();
        block.set_f32(UniformHandle::Model, 1.0);
        block.set_mat4(UniformHandle::Time, [1.0; 16]);
        assert!(block.take_dirty().is_none());
    }

    #[test]
    fn test_writes_mark_dirty_once() {
        let mut block = UniformBlock::new();
        block.take_dirty();
        block.set_f32(UniformHandle::Time, 1.5);
        let globals = block.take_dirty().expect("dirty after write");
        assert_eq!(globals.time, 1.5);
        block.set_f32(UniformHandle::Time, 1.5);
        assert!(block.take_dirty().is_none());
    }
}
