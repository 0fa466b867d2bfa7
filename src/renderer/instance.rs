//! Per-sprite instance data for batched rendering

use bytemuck::{Pod, Zeroable};

/// Render attributes of one sprite, one entry per batch slot
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SpriteInstance {
    /// Center position in viewport pixels (z used for layering)
    pub position: [f32; 3],
    pub scale: f32,
    /// Unscaled quad size in viewport pixels
    pub size: [f32; 2],
    /// Shader effect tag
    pub effect: u32,
    /// 0 = collapsed to nothing in the vertex stage
    pub visible: u32,
    /// Atlas UV rect: u0, v0, u1, v1
    pub uv: [f32; 4],
}

impl SpriteInstance {
    /// Contents of a free or never-written slot
    pub const HIDDEN: Self = Self {
        position: [0.0; 3],
        scale: 0.0,
        size: [0.0; 2],
        effect: 0,
        visible: 0,
        uv: [0.0; 4],
    };

    /// Byte size of one instance in the GPU buffer
    pub const STRIDE: u64 = std::mem::size_of::<SpriteInstance>() as u64;

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
            0 => Float32x3,
            1 => Float32,
            2 => Float32x2,
            3 => Uint32,
            4 => Uint32,
            5 => Float32x4
        ];
        wgpu::VertexBufferLayout {
            array_stride: SpriteInstance::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Clear color behind the play field
pub const BACKGROUND: wgpu::Color = wgpu::Color {
    r: 0.02,
    g: 0.02,
    b: 0.05,
    a: 1.0,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_matches_layout() {
        // 3 + 1 + 2 + 1 + 1 + 4 four-byte fields
        assert_eq!(SpriteInstance::STRIDE, 48);
        assert_eq!(SpriteInstance::desc().attributes.len(), 6);
    }
}
