//! CPU-side uniform staging.
//!
//! A [`UniformLayout`] is produced at program build time from the uniforms
//! declared during emission; a [`UniformData`] is a byte buffer laid out by
//! it. Values are addressed by final (mangled) uniform name and sit at
//! std140 offsets matching the stage's generated uniform block, so the
//! buffer can be uploaded as-is.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};

use crate::glsl::GlslType;
use crate::program_info::ProgramInfo;

#[derive(Debug, Clone)]
pub struct UniformField {
    pub name: String,
    pub ty: GlslType,
    pub offset: usize,
}

/// Name-to-offset mapping for one stage's uniform block.
#[derive(Debug, Default)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    by_name: HashMap<String, usize>,
    size_bytes: usize,
}

impl UniformLayout {
    /// Lay out `declarations` in order under std140 rules.
    pub fn new(declarations: Vec<(String, GlslType)>) -> Self {
        fn align_up(v: usize, align: usize) -> usize {
            v.div_ceil(align) * align
        }

        let mut fields = Vec::with_capacity(declarations.len());
        let mut by_name = HashMap::with_capacity(declarations.len());
        let mut cursor = 0;
        for (name, ty) in declarations {
            let offset = align_up(cursor, ty.std140_align());
            by_name.insert(name.clone(), fields.len());
            fields.push(UniformField { name, ty, offset });
            cursor = offset + ty.std140_size();
        }
        Self {
            fields,
            by_name,
            size_bytes: align_up(cursor, 16),
        }
    }

    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&UniformField> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A zero-initialized staging buffer for one stage's uniform values.
#[derive(Debug, Clone)]
pub struct UniformData {
    layout: Arc<UniformLayout>,
    bytes: Vec<u8>,
}

impl UniformData {
    pub fn new(layout: Arc<UniformLayout>) -> Self {
        let bytes = vec![0_u8; layout.size_bytes()];
        Self { layout, bytes }
    }

    pub fn layout(&self) -> &UniformLayout {
        &self.layout
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn field_checked(&self, name: &str, ty: GlslType) -> Result<usize> {
        let Some(field) = self.layout.field(name) else {
            bail!("unknown uniform {name}");
        };
        if field.ty != ty {
            bail!(
                "uniform {name} is declared {:?}, cannot write {:?}",
                field.ty,
                ty
            );
        }
        Ok(field.offset)
    }

    pub fn set_f32(&mut self, name: &str, v: f32) -> Result<()> {
        let off = self.field_checked(name, GlslType::Float)?;
        self.bytes[off..off + 4].copy_from_slice(bytemuck::bytes_of(&v));
        Ok(())
    }

    pub fn set_i32(&mut self, name: &str, v: i32) -> Result<()> {
        let off = self.field_checked(name, GlslType::Int)?;
        self.bytes[off..off + 4].copy_from_slice(bytemuck::bytes_of(&v));
        Ok(())
    }

    pub fn set_vec2(&mut self, name: &str, v: [f32; 2]) -> Result<()> {
        let off = self.field_checked(name, GlslType::Vec2)?;
        self.bytes[off..off + 8].copy_from_slice(bytemuck::bytes_of(&v));
        Ok(())
    }

    pub fn set_vec3(&mut self, name: &str, v: [f32; 3]) -> Result<()> {
        let off = self.field_checked(name, GlslType::Vec3)?;
        self.bytes[off..off + 12].copy_from_slice(bytemuck::bytes_of(&v));
        Ok(())
    }

    pub fn set_vec4(&mut self, name: &str, v: [f32; 4]) -> Result<()> {
        let off = self.field_checked(name, GlslType::Vec4)?;
        self.bytes[off..off + 16].copy_from_slice(bytemuck::bytes_of(&v));
        Ok(())
    }

    /// Write a column-major mat3, one column per 16-byte slot.
    pub fn set_mat3(&mut self, name: &str, v: [f32; 9]) -> Result<()> {
        let off = self.field_checked(name, GlslType::Mat3)?;
        for col in 0..3 {
            let dst = off + col * 16;
            let src = &v[col * 3..col * 3 + 3];
            self.bytes[dst..dst + 12].copy_from_slice(bytemuck::cast_slice(src));
        }
        Ok(())
    }

    pub fn set_mat4(&mut self, name: &str, v: [f32; 16]) -> Result<()> {
        let off = self.field_checked(name, GlslType::Mat4)?;
        self.bytes[off..off + 64].copy_from_slice(bytemuck::cast_slice(&v));
        Ok(())
    }
}

/// Write every coord-transform matrix of a pipeline into `data`.
///
/// `coord_uniforms` is the uniform-name list recorded when the program was
/// assembled. Ordinal `i` pairs with the `i`-th transform of the pipeline
/// walk, so re-running the walk here lands each matrix on the uniform that
/// was declared for it.
pub fn write_coord_transform_matrices(
    info: &ProgramInfo,
    coord_uniforms: &[String],
    data: &mut UniformData,
) -> Result<()> {
    debug_assert_eq!(info.num_coord_transforms(), coord_uniforms.len());
    for ((_owner, transform), name) in info.pipeline_coord_transforms().zip(coord_uniforms) {
        data.set_mat3(name, transform.matrix)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> Arc<UniformLayout> {
        Arc::new(UniformLayout::new(vec![
            ("u_scale_P0".to_string(), GlslType::Float),
            ("u_color_P1".to_string(), GlslType::Vec4),
            ("u_coord_matrix_0".to_string(), GlslType::Mat3),
            ("u_bias_P2".to_string(), GlslType::Vec2),
        ]))
    }

    #[test]
    fn offsets_follow_std140_rules() {
        let l = layout();
        let offsets: Vec<usize> = l.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 16, 32, 80]);
        assert_eq!(l.size_bytes(), 96);

        // scalars and vec2s pack tightly, vec3 forces 16-byte alignment
        let tight = UniformLayout::new(vec![
            ("u_a".to_string(), GlslType::Float),
            ("u_b".to_string(), GlslType::Float),
            ("u_c".to_string(), GlslType::Vec2),
            ("u_d".to_string(), GlslType::Vec3),
            ("u_e".to_string(), GlslType::Float),
        ]);
        let offsets: Vec<usize> = tight.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 16, 28]);
        assert_eq!(tight.size_bytes(), 32);
    }

    #[test]
    fn writes_land_at_field_offsets() {
        let mut data = UniformData::new(layout());
        data.set_f32("u_scale_P0", 3.0).unwrap();
        data.set_vec4("u_color_P1", [1.0, 0.5, 0.25, 1.0]).unwrap();
        data.set_vec2("u_bias_P2", [9.0, 8.0]).unwrap();

        let bytes = data.bytes();
        let read = |off: usize| f32::from_ne_bytes(bytes[off..off + 4].try_into().unwrap());
        assert_eq!(read(0), 3.0);
        assert_eq!(read(16), 1.0);
        assert_eq!(read(20), 0.5);
        assert_eq!(read(80), 9.0);
        assert_eq!(read(84), 8.0);
    }

    #[test]
    fn mat3_columns_are_slot_aligned() {
        let mut data = UniformData::new(layout());
        let m = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        data.set_mat3("u_coord_matrix_0", m).unwrap();
        let bytes = data.bytes();
        let read = |off: usize| f32::from_ne_bytes(bytes[off..off + 4].try_into().unwrap());
        // base offset 32, second column at 48, third at 64
        assert_eq!(read(32), 1.0);
        assert_eq!(read(40), 3.0);
        assert_eq!(read(48), 4.0);
        assert_eq!(read(64), 7.0);
    }

    #[test]
    fn unknown_name_and_type_mismatch_fail() {
        let mut data = UniformData::new(layout());
        assert!(data.set_f32("u_missing", 1.0).is_err());
        assert!(data.set_vec4("u_scale_P0", [0.0; 4]).is_err());
    }

    #[test]
    fn transform_matrices_follow_pipeline_order() {
        use crate::fragment::FragmentProcessor;
        use crate::fragment::effects::{SeriesProcessor, TextureEffect};
        use crate::geometry::QuadGeometryProcessor;
        use crate::swizzle::Swizzle;
        use crate::texture::{Filter, PixelFormat, TextureDesc, TextureSamplerRef, WrapMode};
        use crate::utils::mat3_translate;
        use crate::xfer::BlendMode;

        let sampler = TextureSamplerRef::new(
            TextureDesc {
                width: 8,
                height: 8,
                format: PixelFormat::Rgba8,
            },
            Filter::Linear,
            WrapMode::Clamp,
        );
        let tree = SeriesProcessor::make(vec![
            Box::new(TextureEffect::new(sampler, mat3_translate(1.0, 0.0)))
                as Box<dyn FragmentProcessor>,
            Box::new(TextureEffect::new(sampler, mat3_translate(2.0, 0.0))),
        ])
        .unwrap();
        let info = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![tree],
            Vec::new(),
            BlendMode::SrcOver,
            Swizzle::RGBA,
        );

        let names = vec![
            "u_coord_matrix_0".to_string(),
            "u_coord_matrix_1".to_string(),
        ];
        let matrices = Arc::new(UniformLayout::new(
            names.iter().map(|n| (n.clone(), GlslType::Mat3)).collect(),
        ));
        let mut data = UniformData::new(matrices);
        write_coord_transform_matrices(&info, &names, &mut data).unwrap();

        let bytes = data.bytes();
        let read = |off: usize| f32::from_ne_bytes(bytes[off..off + 4].try_into().unwrap());
        // translation column of each matrix sits in its third slot
        assert_eq!(read(32), 1.0);
        assert_eq!(read(48 + 32), 2.0);
    }
}
