//! Reflected GLSL types.

/// Element storage of a uniform-block field. Booleans are stored as 32-bit uints.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StorageKind {
    F32,
    I32,
    U32,
}

/// Shape of a type inside a uniform block.
///
/// Matrices are column-major: a `matCxR` is `C` rows of `R` components.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BlockShape {
    pub storage: StorageKind,
    /// Components per row, 1..=4.
    pub components: usize,
    /// 1 for scalars and vectors, column count for matrices.
    pub rows_per_element: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GlslType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    Uint,
    UVec2,
    UVec3,
    UVec4,
    Bool,
    BVec2,
    BVec3,
    BVec4,
    Mat2,
    Mat3,
    Mat4,
    Mat2x3,
    Mat2x4,
    Mat3x2,
    Mat3x4,
    Mat4x2,
    Mat4x3,
    Sampler2D,
    Sampler2DShadow,
    Sampler2DArray,
    Sampler2DArrayShadow,
    Sampler3D,
    SamplerCube,
    SamplerCubeShadow,
    ISampler2D,
    ISampler2DArray,
    ISampler3D,
    ISamplerCube,
    USampler2D,
    USampler2DArray,
    USampler3D,
    USamplerCube,
}

// (GlslType, GL enum as reported by `glGetActiveUniform`, GLSL keyword)
const TABLE: &[(GlslType, u32, &str)] = &[
    (GlslType::Float, glow::FLOAT, "float"),
    (GlslType::Vec2, glow::FLOAT_VEC2, "vec2"),
    (GlslType::Vec3, glow::FLOAT_VEC3, "vec3"),
    (GlslType::Vec4, glow::FLOAT_VEC4, "vec4"),
    (GlslType::Int, glow::INT, "int"),
    (GlslType::IVec2, glow::INT_VEC2, "ivec2"),
    (GlslType::IVec3, glow::INT_VEC3, "ivec3"),
    (GlslType::IVec4, glow::INT_VEC4, "ivec4"),
    (GlslType::Uint, glow::UNSIGNED_INT, "uint"),
    (GlslType::UVec2, glow::UNSIGNED_INT_VEC2, "uvec2"),
    (GlslType::UVec3, glow::UNSIGNED_INT_VEC3, "uvec3"),
    (GlslType::UVec4, glow::UNSIGNED_INT_VEC4, "uvec4"),
    (GlslType::Bool, glow::BOOL, "bool"),
    (GlslType::BVec2, glow::BOOL_VEC2, "bvec2"),
    (GlslType::BVec3, glow::BOOL_VEC3, "bvec3"),
    (GlslType::BVec4, glow::BOOL_VEC4, "bvec4"),
    (GlslType::Mat2, glow::FLOAT_MAT2, "mat2"),
    (GlslType::Mat3, glow::FLOAT_MAT3, "mat3"),
    (GlslType::Mat4, glow::FLOAT_MAT4, "mat4"),
    (GlslType::Mat2x3, glow::FLOAT_MAT2x3, "mat2x3"),
    (GlslType::Mat2x4, glow::FLOAT_MAT2x4, "mat2x4"),
    (GlslType::Mat3x2, glow::FLOAT_MAT3x2, "mat3x2"),
    (GlslType::Mat3x4, glow::FLOAT_MAT3x4, "mat3x4"),
    (GlslType::Mat4x2, glow::FLOAT_MAT4x2, "mat4x2"),
    (GlslType::Mat4x3, glow::FLOAT_MAT4x3, "mat4x3"),
    (GlslType::Sampler2D, glow::SAMPLER_2D, "sampler2D"),
    (GlslType::Sampler2DShadow, glow::SAMPLER_2D_SHADOW, "sampler2DShadow"),
    (GlslType::Sampler2DArray, glow::SAMPLER_2D_ARRAY, "sampler2DArray"),
    (GlslType::Sampler2DArrayShadow, glow::SAMPLER_2D_ARRAY_SHADOW, "sampler2DArrayShadow"),
    (GlslType::Sampler3D, glow::SAMPLER_3D, "sampler3D"),
    (GlslType::SamplerCube, glow::SAMPLER_CUBE, "samplerCube"),
    (GlslType::SamplerCubeShadow, glow::SAMPLER_CUBE_SHADOW, "samplerCubeShadow"),
    (GlslType::ISampler2D, glow::INT_SAMPLER_2D, "isampler2D"),
    (GlslType::ISampler2DArray, glow::INT_SAMPLER_2D_ARRAY, "isampler2DArray"),
    (GlslType::ISampler3D, glow::INT_SAMPLER_3D, "isampler3D"),
    (GlslType::ISamplerCube, glow::INT_SAMPLER_CUBE, "isamplerCube"),
    (GlslType::USampler2D, glow::UNSIGNED_INT_SAMPLER_2D, "usampler2D"),
    (GlslType::USampler2DArray, glow::UNSIGNED_INT_SAMPLER_2D_ARRAY, "usampler2DArray"),
    (GlslType::USampler3D, glow::UNSIGNED_INT_SAMPLER_3D, "usampler3D"),
    (GlslType::USamplerCube, glow::UNSIGNED_INT_SAMPLER_CUBE, "usamplerCube"),
];

impl GlslType {
    pub fn from_gl(gl_type: u32) -> Option<Self> {
        TABLE.iter().find(|(_, e, _)| *e == gl_type).map(|(t, _, _)| *t)
    }

    pub fn to_gl(self) -> u32 {
        TABLE.iter().find(|(t, _, _)| *t == self).map_or(0, |(_, e, _)| *e)
    }

    /// Parses a GLSL type keyword (`vec3`, `mat4x2`, `usampler2D`...).
    pub fn from_glsl(keyword: &str) -> Option<Self> {
        TABLE.iter().find(|(_, _, k)| *k == keyword).map(|(t, _, _)| *t)
    }

    pub fn glsl_name(self) -> &'static str {
        TABLE.iter().find(|(t, _, _)| *t == self).map_or("?", |(_, _, k)| *k)
    }

    pub fn is_sampler(self) -> bool {
        self.block_shape().is_none()
    }

    pub fn is_square_matrix(self) -> bool {
        matches!(self, GlslType::Mat2 | GlslType::Mat3 | GlslType::Mat4)
    }

    pub fn is_non_square_matrix(self) -> bool {
        matches!(
            self,
            GlslType::Mat2x3
                | GlslType::Mat2x4
                | GlslType::Mat3x2
                | GlslType::Mat3x4
                | GlslType::Mat4x2
                | GlslType::Mat4x3
        )
    }

    /// Layout of the type inside a uniform block; `None` for opaque types.
    pub fn block_shape(self) -> Option<BlockShape> {
        use GlslType::*;
        use StorageKind::*;

        let (storage, components, rows_per_element) = match self {
            Float => (F32, 1, 1),
            Vec2 => (F32, 2, 1),
            Vec3 => (F32, 3, 1),
            Vec4 => (F32, 4, 1),
            Int => (I32, 1, 1),
            IVec2 => (I32, 2, 1),
            IVec3 => (I32, 3, 1),
            IVec4 => (I32, 4, 1),
            Uint | Bool => (U32, 1, 1),
            UVec2 | BVec2 => (U32, 2, 1),
            UVec3 | BVec3 => (U32, 3, 1),
            UVec4 | BVec4 => (U32, 4, 1),
            Mat2 => (F32, 2, 2),
            Mat2x3 => (F32, 3, 2),
            Mat2x4 => (F32, 4, 2),
            Mat3x2 => (F32, 2, 3),
            Mat3 => (F32, 3, 3),
            Mat3x4 => (F32, 4, 3),
            Mat4x2 => (F32, 2, 4),
            Mat4x3 => (F32, 3, 4),
            Mat4 => (F32, 4, 4),
            Sampler2D | Sampler2DShadow | Sampler2DArray | Sampler2DArrayShadow | Sampler3D
            | SamplerCube | SamplerCubeShadow | ISampler2D | ISampler2DArray | ISampler3D
            | ISamplerCube | USampler2D | USampler2DArray | USampler3D | USamplerCube => {
                return None;
            }
        };
        Some(BlockShape { storage, components, rows_per_element })
    }
}
