use std::ops::Deref;
use std::sync::Arc;

use crate::spec::refs::{
    DataInRef, DataOutRef, EventInRef, EventOutRef, PortId, SpecRange, SpecRef,
};
use crate::spec::value::{DataType, Value};

/// Name table backing one port kind. Statically pre-built interfaces share a
/// `&'static` slice; dynamically built ones own their strings.
#[derive(Debug, Clone)]
pub enum NameList {
    Static(&'static [&'static str]),
    Dynamic(Vec<String>),
}

impl NameList {
    pub fn len(&self) -> usize {
        match self {
            NameList::Static(s) => s.len(),
            NameList::Dynamic(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        match self {
            NameList::Static(s) => s.get(index).copied(),
            NameList::Dynamic(v) => v.get(index).map(String::as_str),
        }
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        match self {
            NameList::Static(s) => s.iter().position(|n| *n == name),
            NameList::Dynamic(v) => v.iter().position(|n| n == name),
        }
    }
}

/// Type table for data ports, parallel to the corresponding [`NameList`].
#[derive(Debug, Clone)]
pub enum TypeList {
    Static(&'static [DataType]),
    Dynamic(Vec<DataType>),
}

impl TypeList {
    pub fn get(&self, index: usize) -> Option<DataType> {
        match self {
            TypeList::Static(s) => s.get(index).copied(),
            TypeList::Dynamic(v) => v.get(index).copied(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TypeList::Static(s) => s.len(),
            TypeList::Dynamic(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// With-binding of one event: the contiguous data-port range committed
/// atomically when the event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithRange {
    pub first: PortId,
    pub last: PortId,
}

impl WithRange {
    pub fn ids(&self) -> impl Iterator<Item = PortId> + use<> {
        self.first..=self.last
    }
}

/// Composite socket/plug port aggregating a nested block interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterDef {
    pub name: String,
    pub type_name: String,
    /// Plug is the output-like direction, socket the input-like one.
    pub is_plug: bool,
}

/// Compiled, immutable interface descriptor of one block type.
///
/// Built once per type by [`crate::spec::SpecBuilder`] and shared by
/// reference across every instance; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct PortSpec {
    pub(crate) event_input_names: NameList,
    pub(crate) event_output_names: NameList,
    pub(crate) data_input_names: NameList,
    pub(crate) data_input_types: TypeList,
    pub(crate) data_output_names: NameList,
    pub(crate) data_output_types: TypeList,
    /// Per event input: its with-binding, if any.
    pub(crate) input_withs: Vec<Option<WithRange>>,
    /// Per event output: its with-binding, if any.
    pub(crate) output_withs: Vec<Option<WithRange>>,
    pub(crate) adapters: Vec<AdapterDef>,
}

impl PortSpec {
    pub fn num_event_inputs(&self) -> usize {
        self.event_input_names.len()
    }

    pub fn num_event_outputs(&self) -> usize {
        self.event_output_names.len()
    }

    pub fn num_data_inputs(&self) -> usize {
        self.data_input_names.len()
    }

    pub fn num_data_outputs(&self) -> usize {
        self.data_output_names.len()
    }

    pub fn num_adapters(&self) -> usize {
        self.adapters.len()
    }

    pub fn event_input_name(&self, id: PortId) -> Option<&str> {
        self.event_input_names.get(id as usize)
    }

    pub fn event_output_name(&self, id: PortId) -> Option<&str> {
        self.event_output_names.get(id as usize)
    }

    pub fn data_input_type(&self, id: PortId) -> Option<DataType> {
        self.data_input_types.get(id as usize)
    }

    pub fn data_output_type(&self, id: PortId) -> Option<DataType> {
        self.data_output_types.get(id as usize)
    }

    pub fn find_event_input(&self, name: &str) -> EventInRef {
        opt_ref(self.event_input_names.find(name))
    }

    pub fn find_event_output(&self, name: &str) -> EventOutRef {
        opt_ref(self.event_output_names.find(name))
    }

    pub fn find_data_input(&self, name: &str) -> DataInRef {
        opt_ref(self.data_input_names.find(name))
    }

    pub fn find_data_output(&self, name: &str) -> DataOutRef {
        opt_ref(self.data_output_names.find(name))
    }

    pub fn find_adapter(&self, name: &str) -> Option<PortId> {
        self.adapters
            .iter()
            .position(|a| a.name == name)
            .map(|i| i as PortId)
    }

    pub fn adapter(&self, id: PortId) -> Option<&AdapterDef> {
        self.adapters.get(id as usize)
    }

    /// With-binding of an event input, if one was declared.
    pub fn input_with(&self, event: PortId) -> Option<WithRange> {
        self.input_withs.get(event as usize).copied().flatten()
    }

    /// With-binding of an event output, if one was declared.
    pub fn output_with(&self, event: PortId) -> Option<WithRange> {
        self.output_withs.get(event as usize).copied().flatten()
    }

    /// Fresh default values for all data inputs of this type.
    pub fn default_inputs(&self) -> Vec<Value> {
        (0..self.num_data_inputs())
            .map(|i| Value::default_for(self.data_input_types.get(i).unwrap_or(DataType::Bool)))
            .collect()
    }

    /// Fresh default values for all data outputs of this type.
    pub fn default_outputs(&self) -> Vec<Value> {
        (0..self.num_data_outputs())
            .map(|i| Value::default_for(self.data_output_types.get(i).unwrap_or(DataType::Bool)))
            .collect()
    }
}

fn opt_ref<K, D>(index: Option<usize>) -> SpecRef<K, D> {
    match index {
        Some(i) => SpecRef::from_index(i),
        None => SpecRef::invalid(),
    }
}

impl<K, D> SpecRange<K, D> {
    pub(crate) fn from_with(range: WithRange) -> Self {
        Self {
            first: SpecRef::from_index(range.first as usize),
            last: SpecRef::from_index(range.last as usize),
        }
    }
}

/// Shared handle to a compiled interface.
///
/// Unifies statically pre-built (shared by reference, typically behind a
/// `LazyLock`) and dynamically built (runtime-owned) descriptors behind one
/// capability, so the dispatcher is agnostic to the backing storage.
#[derive(Debug, Clone)]
pub enum InterfaceHandle {
    Static(&'static PortSpec),
    Dynamic(Arc<PortSpec>),
}

impl InterfaceHandle {
    pub fn dynamic(spec: PortSpec) -> Self {
        InterfaceHandle::Dynamic(Arc::new(spec))
    }
}

impl Deref for InterfaceHandle {
    type Target = PortSpec;

    fn deref(&self) -> &PortSpec {
        match self {
            InterfaceHandle::Static(s) => s,
            InterfaceHandle::Dynamic(a) => a,
        }
    }
}

impl From<PortSpec> for InterfaceHandle {
    fn from(spec: PortSpec) -> Self {
        InterfaceHandle::dynamic(spec)
    }
}

impl From<&'static PortSpec> for InterfaceHandle {
    fn from(spec: &'static PortSpec) -> Self {
        InterfaceHandle::Static(spec)
    }
}
