//! std140 uniform-block layout derived from program reflection, and the
//! packer that writes named values into a matching byte buffer.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use super::glsl_type::{GlslType, StorageKind};
use super::value::{BlockValues, Scalar, UniformValue};
use crate::backend::{ActiveUniform, Backend};

/// Storage units are 4 bytes wide (one float / int / uint).
const UNIT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("field {field} of uniform block {block} has type 0x{gl_type:04X}, which has no block layout")]
    UnsupportedType { block: String, field: String, gl_type: u32 },

    #[error("field {field} of uniform block {block} has no reported offset")]
    MissingOffset { block: String, field: String },
}

// ── layout ────────────────────────────────────────────────────────────────

/// Placement of one block field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FieldLayout {
    pub ty: GlslType,
    /// Byte offset inside the block.
    pub offset: usize,
    pub storage: StorageKind,
    /// Components per row, 1..=4.
    pub components: usize,
    /// Array length times rows per element.
    pub rows: usize,
    /// Row stride in storage units: 1 or 2 for lone scalars / vec2, else 4.
    pub alignment: usize,
}

impl FieldLayout {
    fn from_reflection(ty: GlslType, offset: usize, array_len: usize) -> Option<Self> {
        let shape = ty.block_shape()?;
        let alignment = if array_len == 1 && shape.rows_per_element == 1 && shape.components <= 2 {
            shape.components
        } else {
            4
        };
        Some(Self {
            ty,
            offset,
            storage: shape.storage,
            components: shape.components,
            rows: array_len * shape.rows_per_element,
            alignment,
        })
    }

    /// Storage units covered by the field's view.
    pub fn units(&self) -> usize {
        self.alignment * self.rows
    }

    /// One past the last byte of the field's view.
    pub fn end(&self) -> usize {
        self.offset + self.units() * UNIT
    }

    /// Storage unit that receives flat input element `i`, if it fits.
    fn unit_for(&self, i: usize) -> Option<usize> {
        let dst = (i / self.components) * self.alignment + i % self.components;
        (dst < self.units()).then_some(dst)
    }
}

/// Field table of one uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    name: String,
    size: usize,
    fields: BTreeMap<String, FieldLayout>,
}

impl BlockLayout {
    /// Builds the layout from the reflected members of block `name`.
    ///
    /// `members` must belong to the block; their names may carry the
    /// `Block.` prefix and a trailing `[0]`. The backing size is the larger of
    /// `data_size` and the end of the last field view.
    pub fn from_reflection<'a, I>(name: &str, data_size: u32, members: I) -> Result<Self, LayoutError>
    where
        I: IntoIterator<Item = &'a ActiveUniform>,
    {
        let prefix = format!("{name}.");
        let mut fields = BTreeMap::new();
        let mut size = data_size as usize;

        for member in members {
            let field = member.name.strip_prefix(&prefix).unwrap_or(&member.name);
            let field = field.strip_suffix("[0]").unwrap_or(field);

            let unsupported = || LayoutError::UnsupportedType {
                block: name.to_owned(),
                field: field.to_owned(),
                gl_type: member.gl_type,
            };
            let ty = GlslType::from_gl(member.gl_type).ok_or_else(unsupported)?;
            let offset = member.offset.ok_or_else(|| LayoutError::MissingOffset {
                block: name.to_owned(),
                field: field.to_owned(),
            })?;
            let layout = FieldLayout::from_reflection(ty, offset as usize, member.size.max(1) as usize)
                .ok_or_else(unsupported)?;

            size = size.max(layout.end());
            fields.insert(field.to_owned(), layout);
        }

        Ok(Self { name: name.to_owned(), size, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing buffer size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldLayout)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ── packing ───────────────────────────────────────────────────────────────

/// CPU-side copy of a block's contents.
#[derive(Debug, Clone)]
pub struct BlockPacker {
    layout: BlockLayout,
    data: Vec<u8>,
    warned: HashSet<String>,
}

impl BlockPacker {
    pub fn new(layout: BlockLayout) -> Self {
        let data = vec![0; layout.size()];
        Self { layout, data, warned: HashSet::new() }
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Writes one field. Unknown names warn once and leave the buffer untouched.
    ///
    /// Scalars land in the field's first unit. Flat arrays are spread over
    /// rows of `components` values, each row starting on an `alignment`
    /// boundary; input past the end of the field is ignored.
    pub fn write(&mut self, name: &str, value: &UniformValue<'_>) -> bool {
        let Some(field) = self.layout.field(name).copied() else {
            if self.warned.insert(name.to_owned()) {
                log::warn!("uniform block {} has no field {name}", self.layout.name());
            }
            return false;
        };

        if !value.is_array() {
            if let Some(v) = value.scalar(0) {
                self.put(&field, 0, v);
            }
            return true;
        }

        for i in 0..value.len() {
            let (Some(unit), Some(v)) = (field.unit_for(i), value.scalar(i)) else {
                break;
            };
            self.put(&field, unit, v);
        }
        true
    }

    /// Writes every entry of `values`; returns whether any field was known.
    pub fn set(&mut self, values: &BlockValues<'_>) -> bool {
        let mut wrote = false;
        for (name, value) in values.iter() {
            wrote |= self.write(name, value);
        }
        wrote
    }

    fn put(&mut self, field: &FieldLayout, unit: usize, v: Scalar) {
        let at = field.offset + unit * UNIT;
        let bytes = match field.storage {
            StorageKind::F32 => v.to_f32().to_ne_bytes(),
            StorageKind::I32 => v.to_i32().to_ne_bytes(),
            StorageKind::U32 => v.to_u32().to_ne_bytes(),
        };
        if let Some(slot) = self.data.get_mut(at..at + UNIT) {
            slot.copy_from_slice(&bytes);
        }
    }

    /// Packed contents reinterpreted as 32-bit floats.
    pub fn as_f32s(&self) -> Vec<f32> {
        self.data.chunks_exact(UNIT).map(bytemuck::pod_read_unaligned).collect()
    }
}

// ── GPU block ─────────────────────────────────────────────────────────────

/// A packed block plus the uniform buffer it uploads into.
pub struct UniformBlock<B: Backend> {
    packer: BlockPacker,
    buffer: B::Buffer,
    binding: u32,
}

impl<B: Backend> UniformBlock<B> {
    pub fn new(backend: &B, layout: BlockLayout, binding: u32) -> anyhow::Result<Self> {
        let buffer = backend.create_buffer()?;
        Ok(Self { packer: BlockPacker::new(layout), buffer, binding })
    }

    /// Keeps the buffer, resets contents for a new layout.
    pub(crate) fn relayout(&mut self, layout: BlockLayout, binding: u32) {
        self.packer = BlockPacker::new(layout);
        self.binding = binding;
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }

    pub fn layout(&self) -> &BlockLayout {
        self.packer.layout()
    }

    pub fn packer(&self) -> &BlockPacker {
        &self.packer
    }

    /// Packs `values` and, if any field matched, uploads the whole block to
    /// its binding slot.
    pub fn set(&mut self, backend: &B, values: &BlockValues<'_>) {
        if self.packer.set(values) {
            backend.upload_uniform_buffer(&self.buffer, self.binding, self.packer.data());
        }
    }

    pub(crate) fn bind(&self, backend: &B) {
        backend.bind_uniform_buffer(&self.buffer, self.binding);
    }

    /// Deletes the backing buffer.
    pub(crate) fn release(self, backend: &B) {
        backend.delete_buffer(&self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    fn member(name: &str, ty: GlslType, size: u32, offset: u32) -> ActiveUniform {
        ActiveUniform { name: name.into(), gl_type: ty.to_gl(), size, block_index: Some(0), offset: Some(offset) }
    }

    fn packer(name: &str, data_size: u32, members: &[ActiveUniform]) -> BlockPacker {
        BlockPacker::new(BlockLayout::from_reflection(name, data_size, members).unwrap())
    }

    // ── layout ────────────────────────────────────────────────────────────

    #[test]
    fn alignment_follows_component_count() {
        let layout = BlockLayout::from_reflection(
            "P",
            96,
            &[
                member("a", GlslType::Float, 1, 0),
                member("b", GlslType::Vec2, 1, 8),
                member("c", GlslType::Vec3, 1, 16),
                member("d[0]", GlslType::Float, 2, 32),
                member("m", GlslType::Mat3, 1, 64),
            ],
        )
        .unwrap();
        let align = |n: &str| layout.field(n).map(|f| (f.alignment, f.rows));
        assert_eq!(align("a"), Some((1, 1)));
        assert_eq!(align("b"), Some((2, 1)));
        assert_eq!(align("c"), Some((4, 1)));
        assert_eq!(align("d"), Some((4, 2)));
        assert_eq!(align("m"), Some((4, 3)));
    }

    #[test]
    fn strips_block_prefix() {
        let layout =
            BlockLayout::from_reflection("Camera", 64, &[member("Camera.view", GlslType::Mat4, 1, 0)]).unwrap();
        assert!(layout.field("view").is_some());
    }

    #[test]
    fn sampler_member_is_rejected() {
        let err = BlockLayout::from_reflection("B", 16, &[member("s", GlslType::Sampler2D, 1, 0)]).unwrap_err();
        assert!(matches!(err, LayoutError::UnsupportedType { .. }));
    }

    #[test]
    fn backing_grows_to_cover_last_view() {
        let layout = BlockLayout::from_reflection("B", 28, &[member("v", GlslType::Vec3, 1, 16)]).unwrap();
        assert_eq!(layout.size(), 32);
    }

    // ── packing ───────────────────────────────────────────────────────────

    #[test]
    fn lone_float_sits_at_offset_zero() {
        let mut p = packer("B", 16, &[member("x", GlslType::Float, 1, 0)]);
        assert!(p.write("x", &3.5f32.into()));
        assert_eq!(p.data()[0..4], 3.5f32.to_ne_bytes());
        assert_eq!(p.as_f32s(), [3.5, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn vec3_array_pads_each_row() {
        let mut p = packer("B", 32, &[member("arr[0]", GlslType::Vec3, 2, 0)]);
        p.write("arr", &UniformValue::Floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(p.as_f32s(), [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0]);
    }

    #[test]
    fn row_padding_per_component_count() {
        let mut p = packer(
            "B",
            128,
            &[
                member("f[0]", GlslType::Float, 2, 0),
                member("v2[0]", GlslType::Vec2, 2, 32),
                member("v4[0]", GlslType::Vec4, 2, 64),
            ],
        );
        p.write("f", &UniformValue::Floats(&[1.0, 2.0]));
        p.write("v2", &UniformValue::Floats(&[1.0, 2.0, 3.0, 4.0]));
        p.write("v4", &UniformValue::Floats(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]));
        let f = p.as_f32s();
        assert_eq!(f[0..8], [1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
        assert_eq!(f[8..16], [1.0, 2.0, 0.0, 0.0, 3.0, 4.0, 0.0, 0.0]);
        assert_eq!(f[16..24], [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn mat3_columns_are_vec4_aligned() {
        let mut p = packer("B", 48, &[member("m", GlslType::Mat3, 1, 0)]);
        let m: Vec<f32> = (1..=9).map(|i| i as f32).collect();
        p.write("m", &(&m).into());
        assert_eq!(p.as_f32s(), [1.0, 2.0, 3.0, 0.0, 4.0, 5.0, 6.0, 0.0, 7.0, 8.0, 9.0, 0.0]);
    }

    #[test]
    fn excess_input_does_not_spill_into_next_field() {
        let mut p = packer("B", 32, &[member("v", GlslType::Vec2, 1, 0), member("w", GlslType::Float, 1, 8)]);
        p.write("w", &7.0f32.into());
        p.write("v", &UniformValue::Floats(&[1.0, 2.0, 3.0, 4.0]));
        assert_eq!(p.as_f32s()[0..3], [1.0, 2.0, 7.0]);
    }

    #[test]
    fn int_and_bool_storage() {
        let mut p = packer("B", 16, &[member("i", GlslType::Int, 1, 0), member("b", GlslType::Bool, 1, 4)]);
        p.write("i", &(-3i32).into());
        p.write("b", &true.into());
        assert_eq!(p.data()[0..4], (-3i32).to_ne_bytes());
        assert_eq!(p.data()[4..8], 1u32.to_ne_bytes());
    }

    #[test]
    fn unknown_field_is_a_no_op() {
        let mut p = packer("B", 16, &[member("x", GlslType::Float, 1, 0)]);
        let before = p.data().to_vec();
        assert!(!p.write("missing", &1.0f32.into()));
        assert!(!p.write("missing", &1.0f32.into()));
        assert_eq!(p.data(), before.as_slice());
    }

    // ── upload ────────────────────────────────────────────────────────────

    #[test]
    fn set_uploads_only_when_something_matched() {
        let mock = MockBackend::new();
        let layout = BlockLayout::from_reflection("B", 16, &[member("x", GlslType::Float, 1, 0)]).unwrap();
        let mut block = UniformBlock::new(&mock, layout, 3).unwrap();

        block.set(&mock, &BlockValues::new().with("nope", 1.0f32));
        assert_eq!(mock.bound_block_data(3), None);

        block.set(&mock, &BlockValues::new().with("x", 2.0f32).with("nope", 1.0f32));
        let data = mock.bound_block_data(3).unwrap();
        assert_eq!(data[0..4], 2.0f32.to_ne_bytes());
    }
}
