// Copyright (C) 2023 gigablaster

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! SPIR-V reflection. `rspirv-reflect` gives us descriptor set/binding and a
//! coarse type category per resource; it doesn't walk struct members down to
//! offset/size, so we additionally parse the module with `rspirv` and read
//! `OpTypeStruct`/`OpMemberDecorate` ourselves to build the nested
//! `ShaderResource` trees the reflected uniform and push-constant buffers need.

use std::collections::HashMap;

use byte_slice_cast::AsSliceOf;
use dess_assets::{ConcreteType, ImageDimension, ResourceKind, ShaderResource};
use rspirv::{
    dr::{Instruction, Loader, Operand},
    spirv::{Decoration, Op, StorageClass},
};

use crate::error::{Error, Result};

pub struct ReflectedShader {
    pub uniform_buffers: Vec<ShaderResource>,
    pub inputs: Vec<ShaderResource>,
    pub outputs: Vec<ShaderResource>,
    pub storage_images: Vec<ShaderResource>,
    pub sampled_images: Vec<ShaderResource>,
    pub atomic_counters: Vec<ShaderResource>,
    pub push_constant_buffers: Vec<ShaderResource>,
    pub separate_images: Vec<ShaderResource>,
    pub separate_samplers: Vec<ShaderResource>,
    pub workgroup_size: [u32; 3],
}

struct TypeWalker<'a> {
    module: &'a rspirv::dr::Module,
    member_names: HashMap<(u32, u32), String>,
    member_offsets: HashMap<(u32, u32), u32>,
    type_sizes: HashMap<u32, u32>,
}

impl<'a> TypeWalker<'a> {
    fn new(module: &'a rspirv::dr::Module) -> Self {
        let mut member_names = HashMap::new();
        for inst in &module.debug_names {
            if inst.class.opcode == Op::MemberName {
                if let (Some(&Operand::IdRef(ty)), Some(&Operand::LiteralInt32(member))) =
                    (inst.operands.first(), inst.operands.get(1))
                {
                    if let Some(Operand::LiteralString(name)) = inst.operands.get(2) {
                        member_names.insert((ty, member), name.clone());
                    }
                }
            }
        }

        let mut member_offsets = HashMap::new();
        for inst in &module.annotations {
            if inst.class.opcode == Op::MemberDecorate {
                if let (
                    Some(&Operand::IdRef(ty)),
                    Some(&Operand::LiteralInt32(member)),
                    Some(&Operand::Decoration(Decoration::Offset)),
                    Some(&Operand::LiteralInt32(offset)),
                ) = (
                    inst.operands.first(),
                    inst.operands.get(1),
                    inst.operands.get(2),
                    inst.operands.get(3),
                ) {
                    member_offsets.insert((ty, member), offset);
                }
            }
        }

        Self {
            module,
            member_names,
            member_offsets,
            type_sizes: HashMap::new(),
        }
    }

    fn find_type(&self, id: u32) -> Option<&Instruction> {
        self.module
            .types_global_values
            .iter()
            .find(|inst| inst.result_id == Some(id))
    }

    /// Classifies a scalar/vector/matrix/struct type per §4.4's
    /// `(basetype, vecsize, columns)` rule: scalars at `(1,1)`, vectors at
    /// `(cols=1, vecsize in 2..=4)`, matrices at `(3,3)/(4,3)/(4,4)`.
    fn classify(&mut self, type_id: u32) -> (ConcreteType, u32, u32, u32) {
        let Some(inst) = self.find_type(type_id) else {
            return (ConcreteType::Unknown, 0, 0, 0);
        };
        match inst.class.opcode {
            Op::TypeBool => (ConcreteType::Bool, 1, 1, self.size_of(type_id)),
            Op::TypeInt => {
                let signed = matches!(inst.operands.get(1), Some(Operand::LiteralInt32(1)));
                let ty = if signed { ConcreteType::Int } else { ConcreteType::UInt };
                (ty, 1, 1, self.size_of(type_id))
            }
            Op::TypeFloat => {
                let width = matches!(inst.operands.first(), Some(Operand::LiteralInt32(64)));
                let ty = if width { ConcreteType::Double } else { ConcreteType::Float };
                (ty, 1, 1, self.size_of(type_id))
            }
            Op::TypeVector => {
                let component = match inst.operands.first() {
                    Some(Operand::IdRef(id)) => *id,
                    _ => 0,
                };
                let count = match inst.operands.get(1) {
                    Some(Operand::LiteralInt32(n)) => *n,
                    _ => 0,
                };
                let (base, ..) = self.classify(component);
                let concrete = match (base, count) {
                    (_, 2) => ConcreteType::Vec2,
                    (_, 3) => ConcreteType::Vec3,
                    (_, 4) => ConcreteType::Vec4,
                    _ => ConcreteType::Unknown,
                };
                (concrete, count, 1, self.size_of(type_id))
            }
            Op::TypeMatrix => {
                let column_type = match inst.operands.first() {
                    Some(Operand::IdRef(id)) => *id,
                    _ => 0,
                };
                let cols = match inst.operands.get(1) {
                    Some(Operand::LiteralInt32(n)) => *n,
                    _ => 0,
                };
                let (_, vec_size, ..) = self.classify(column_type);
                let concrete = match (vec_size, cols) {
                    (3, 3) => ConcreteType::Mat3x3,
                    (4, 3) => ConcreteType::Mat4x3,
                    (4, 4) => ConcreteType::Mat4x4,
                    _ => ConcreteType::Unknown,
                };
                (concrete, vec_size, cols, self.size_of(type_id))
            }
            Op::TypeStruct => (ConcreteType::Struct, 0, 0, self.size_of(type_id)),
            _ => (ConcreteType::Unknown, 0, 0, 0),
        }
    }

    fn size_of(&mut self, type_id: u32) -> u32 {
        if let Some(size) = self.type_sizes.get(&type_id) {
            return *size;
        }
        let size = self.compute_size(type_id);
        self.type_sizes.insert(type_id, size);
        size
    }

    fn compute_size(&mut self, type_id: u32) -> u32 {
        let Some(inst) = self.find_type(type_id).cloned() else {
            return 0;
        };
        match inst.class.opcode {
            Op::TypeBool | Op::TypeInt => 4,
            Op::TypeFloat => match inst.operands.first() {
                Some(Operand::LiteralInt32(64)) => 8,
                _ => 4,
            },
            Op::TypeVector => {
                let component = match inst.operands.first() {
                    Some(Operand::IdRef(id)) => *id,
                    _ => return 0,
                };
                let count = match inst.operands.get(1) {
                    Some(Operand::LiteralInt32(n)) => *n,
                    _ => 0,
                };
                self.size_of(component) * count
            }
            Op::TypeMatrix => {
                let column_type = match inst.operands.first() {
                    Some(Operand::IdRef(id)) => *id,
                    _ => return 0,
                };
                let cols = match inst.operands.get(1) {
                    Some(Operand::LiteralInt32(n)) => *n,
                    _ => 0,
                };
                self.size_of(column_type) * cols
            }
            Op::TypeArray => {
                let element = match inst.operands.first() {
                    Some(Operand::IdRef(id)) => *id,
                    _ => return 0,
                };
                self.size_of(element)
            }
            Op::TypeStruct => {
                let member_count = inst.operands.len() as u32;
                let mut max_end = 0u32;
                for member in 0..member_count {
                    let member_type = match inst.operands.get(member as usize) {
                        Some(Operand::IdRef(id)) => *id,
                        _ => continue,
                    };
                    let offset = self
                        .member_offsets
                        .get(&(type_id, member))
                        .copied()
                        .unwrap_or(0);
                    max_end = max_end.max(offset + self.size_of(member_type));
                }
                max_end
            }
            _ => 0,
        }
    }

    fn members(&mut self, type_id: u32) -> Vec<ShaderResource> {
        let Some(inst) = self.find_type(type_id).cloned() else {
            return Vec::new();
        };
        if inst.class.opcode != Op::TypeStruct {
            return Vec::new();
        }
        let mut out = Vec::new();
        for (member, operand) in inst.operands.iter().enumerate() {
            let Operand::IdRef(member_type) = operand else {
                continue;
            };
            let member = member as u32;
            let (concrete_type, vec_size, cols, size) = self.classify(*member_type);
            let offset = self.member_offsets.get(&(type_id, member)).copied().unwrap_or(0);
            let name = self
                .member_names
                .get(&(type_id, member))
                .cloned()
                .unwrap_or_default();
            out.push(ShaderResource {
                name,
                kind: ResourceKind::UniformBuffer,
                concrete_type,
                is_array: false,
                array_size: Vec::new(),
                binding: 0,
                desc_set: 0,
                image_dimension: None,
                image_arrayed: false,
                cols,
                vec_size,
                offset,
                size,
                members: if concrete_type == ConcreteType::Struct {
                    self.members(*member_type)
                } else {
                    Vec::new()
                },
            });
        }
        out
    }
}

fn image_dimension(dim: rspirv::spirv::Dim) -> Option<ImageDimension> {
    match dim {
        rspirv::spirv::Dim::Dim1D => Some(ImageDimension::D1),
        rspirv::spirv::Dim::Dim2D => Some(ImageDimension::D2),
        rspirv::spirv::Dim::Dim3D => Some(ImageDimension::D3),
        rspirv::spirv::Dim::DimCube => Some(ImageDimension::Cube),
        _ => None,
    }
}

/// Reflects one SPIR-V module into the nine fixed resource categories.
/// `rspirv-reflect` supplies descriptor-set/binding/name/count per binding;
/// we read the pointee type out of the raw module to classify it and,
/// for buffers, to recurse into member offsets/sizes.
pub fn reflect(spirv: &[u8]) -> Result<ReflectedShader> {
    let words = spirv
        .as_slice_of::<u32>()
        .map_err(|err| Error::Decode("spirv".to_owned(), err.to_string()))?;

    let mut loader = Loader::new();
    rspirv::binary::parse_words(words, &mut loader)
        .map_err(|err| Error::Decode("spirv".to_owned(), err.to_string()))?;
    let module = loader.module();

    let reflection = rspirv_reflect::Reflection::new_from_spirv(spirv)
        .map_err(|err| Error::Decode("spirv".to_owned(), err.to_string()))?;
    let sets = reflection
        .get_descriptor_sets()
        .map_err(|err| Error::Decode("spirv".to_owned(), err.to_string()))?;

    let mut walker = TypeWalker::new(&module);

    let mut uniform_buffers = Vec::new();
    let mut storage_images = Vec::new();
    let mut sampled_images = Vec::new();
    let mut separate_images = Vec::new();
    let mut separate_samplers = Vec::new();
    let atomic_counters = Vec::new();
    let push_constant_buffers = push_constants(&module, &mut walker);

    for (desc_set, bindings) in &sets {
        for (binding, info) in bindings {
            let count = match info.binding_count {
                rspirv_reflect::BindingCount::One => 1,
                rspirv_reflect::BindingCount::StaticSized(n) => n as u32,
                rspirv_reflect::BindingCount::Unbounded => 0,
            };
            let is_array = count != 1;
            let pointee = find_variable_pointee(&module, *desc_set, *binding);
            let (concrete_type, vec_size, cols, size) = pointee
                .map(|ty| walker.classify(ty))
                .unwrap_or((ConcreteType::Unknown, 0, 0, 0));
            let members = pointee
                .filter(|_| concrete_type == ConcreteType::Struct)
                .map(|ty| walker.members(ty))
                .unwrap_or_default();
            let image_dim = pointee.and_then(|ty| image_type_of(&module, ty));

            let resource = ShaderResource {
                name: info.name.clone(),
                kind: match info.ty {
                    rspirv_reflect::DescriptorType::UNIFORM_BUFFER => ResourceKind::UniformBuffer,
                    rspirv_reflect::DescriptorType::STORAGE_IMAGE => ResourceKind::StorageImage,
                    rspirv_reflect::DescriptorType::SAMPLED_IMAGE => ResourceKind::SeparateImage,
                    rspirv_reflect::DescriptorType::SAMPLER => ResourceKind::SeparateSampler,
                    rspirv_reflect::DescriptorType::COMBINED_IMAGE_SAMPLER => ResourceKind::SampledImage,
                    rspirv_reflect::DescriptorType::STORAGE_BUFFER => ResourceKind::UniformBuffer,
                    _ => ResourceKind::UniformBuffer,
                },
                concrete_type,
                is_array,
                array_size: if is_array { vec![count] } else { Vec::new() },
                binding: *binding,
                desc_set: *desc_set,
                image_dimension: image_dim.map(|(dim, _)| dim),
                image_arrayed: image_dim.map(|(_, arrayed)| arrayed).unwrap_or(false),
                cols,
                vec_size,
                offset: 0,
                size,
                members,
            };

            match resource.kind {
                ResourceKind::UniformBuffer => uniform_buffers.push(resource),
                ResourceKind::StorageImage => storage_images.push(resource),
                ResourceKind::SampledImage => sampled_images.push(resource),
                ResourceKind::SeparateImage => separate_images.push(resource),
                ResourceKind::SeparateSampler => separate_samplers.push(resource),
                _ => {}
            }
        }
    }

    let (inputs, outputs) = in_out_variables(&module, &mut walker);
    let workgroup_size = local_size(&module);

    Ok(ReflectedShader {
        uniform_buffers,
        inputs,
        outputs,
        storage_images,
        sampled_images,
        atomic_counters,
        push_constant_buffers,
        separate_images,
        separate_samplers,
        workgroup_size,
    })
}

fn find_variable_pointee(module: &rspirv::dr::Module, desc_set: u32, binding: u32) -> Option<u32> {
    let mut target_id = None;
    for inst in &module.annotations {
        if inst.class.opcode != Op::Decorate {
            continue;
        }
        let Some(&Operand::IdRef(id)) = inst.operands.first() else {
            continue;
        };
        match inst.operands.get(1) {
            Some(Operand::Decoration(Decoration::DescriptorSet)) => {
                if matches!(inst.operands.get(2), Some(Operand::LiteralInt32(n)) if *n == desc_set)
                {
                    target_id = target_id.or(Some(id)).filter(|_| true);
                }
            }
            _ => {}
        }
        if matches!(inst.operands.get(1), Some(Operand::Decoration(Decoration::Binding)))
            && matches!(inst.operands.get(2), Some(Operand::LiteralInt32(n)) if *n == binding)
        {
            if has_matching_desc_set(module, id, desc_set) {
                target_id = Some(id);
            }
        }
    }
    let var_id = target_id?;
    let var = module
        .types_global_values
        .iter()
        .find(|inst| inst.result_id == Some(var_id) && inst.class.opcode == Op::Variable)?;
    let pointer_type = var.result_type?;
    let pointer_inst = module
        .types_global_values
        .iter()
        .find(|inst| inst.result_id == Some(pointer_type) && inst.class.opcode == Op::TypePointer)?;
    match pointer_inst.operands.get(1) {
        Some(Operand::IdRef(pointee)) => Some(*pointee),
        _ => None,
    }
}

fn has_matching_desc_set(module: &rspirv::dr::Module, var_id: u32, desc_set: u32) -> bool {
    module.annotations.iter().any(|inst| {
        inst.class.opcode == Op::Decorate
            && matches!(inst.operands.first(), Some(Operand::IdRef(id)) if *id == var_id)
            && matches!(inst.operands.get(1), Some(Operand::Decoration(Decoration::DescriptorSet)))
            && matches!(inst.operands.get(2), Some(Operand::LiteralInt32(n)) if *n == desc_set)
    })
}

fn image_type_of(module: &rspirv::dr::Module, type_id: u32) -> Option<(ImageDimension, bool)> {
    let inst = module
        .types_global_values
        .iter()
        .find(|inst| inst.result_id == Some(type_id))?;
    if inst.class.opcode != Op::TypeImage {
        return None;
    }
    let dim = match inst.operands.get(1) {
        Some(Operand::Dim(dim)) => *dim,
        _ => return None,
    };
    let arrayed = matches!(inst.operands.get(3), Some(Operand::LiteralInt32(1)));
    Some((image_dimension(dim)?, arrayed))
}

fn push_constants(module: &rspirv::dr::Module, walker: &mut TypeWalker) -> Vec<ShaderResource> {
    let mut out = Vec::new();
    for inst in &module.types_global_values {
        if inst.class.opcode != Op::Variable {
            continue;
        }
        if !matches!(inst.operands.first(), Some(Operand::StorageClass(StorageClass::PushConstant))) {
            continue;
        }
        let Some(pointer_type) = inst.result_type else { continue };
        let Some(pointer_inst) = module
            .types_global_values
            .iter()
            .find(|i| i.result_id == Some(pointer_type) && i.class.opcode == Op::TypePointer)
        else {
            continue;
        };
        let Some(&Operand::IdRef(pointee)) = pointer_inst.operands.get(1) else {
            continue;
        };
        let (concrete_type, vec_size, cols, size) = walker.classify(pointee);
        out.push(ShaderResource {
            name: "PushConstants".to_owned(),
            kind: ResourceKind::PushConstantBuffer,
            concrete_type,
            is_array: false,
            array_size: Vec::new(),
            binding: 0,
            desc_set: 0,
            image_dimension: None,
            image_arrayed: false,
            cols,
            vec_size,
            offset: 0,
            size,
            members: walker.members(pointee),
        });
    }
    out
}

fn in_out_variables(
    module: &rspirv::dr::Module,
    walker: &mut TypeWalker,
) -> (Vec<ShaderResource>, Vec<ShaderResource>) {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for inst in &module.types_global_values {
        if inst.class.opcode != Op::Variable {
            continue;
        }
        let storage = match inst.operands.first() {
            Some(Operand::StorageClass(class)) => *class,
            _ => continue,
        };
        if storage != StorageClass::Input && storage != StorageClass::Output {
            continue;
        }
        let Some(pointer_type) = inst.result_type else { continue };
        let Some(pointer_inst) = module
            .types_global_values
            .iter()
            .find(|i| i.result_id == Some(pointer_type) && i.class.opcode == Op::TypePointer)
        else {
            continue;
        };
        let Some(&Operand::IdRef(pointee)) = pointer_inst.operands.get(1) else {
            continue;
        };
        let (concrete_type, vec_size, cols, size) = walker.classify(pointee);
        let resource = ShaderResource {
            name: String::new(),
            kind: if storage == StorageClass::Input {
                ResourceKind::Input
            } else {
                ResourceKind::Output
            },
            concrete_type,
            is_array: false,
            array_size: Vec::new(),
            binding: 0,
            desc_set: 0,
            image_dimension: None,
            image_arrayed: false,
            cols,
            vec_size,
            offset: 0,
            size,
            members: Vec::new(),
        };
        if storage == StorageClass::Input {
            inputs.push(resource);
        } else {
            outputs.push(resource);
        }
    }
    (inputs, outputs)
}

fn local_size(module: &rspirv::dr::Module) -> [u32; 3] {
    for mode in &module.execution_modes {
        if mode.class.opcode == Op::ExecutionMode {
            if let Some(Operand::ExecutionMode(rspirv::spirv::ExecutionMode::LocalSize)) =
                mode.operands.get(1)
            {
                let x = match mode.operands.get(2) {
                    Some(Operand::LiteralInt32(n)) => *n,
                    _ => 0,
                };
                let y = match mode.operands.get(3) {
                    Some(Operand::LiteralInt32(n)) => *n,
                    _ => 0,
                };
                let z = match mode.operands.get(4) {
                    Some(Operand::LiteralInt32(n)) => *n,
                    _ => 0,
                };
                return [x, y, z];
            }
        }
    }
    [0, 0, 0]
}
