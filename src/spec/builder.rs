use std::marker::PhantomData;

use ahash::AHashMap;

use crate::error::SpecError;
use crate::spec::interface::{AdapterDef, NameList, PortSpec, TypeList, WithRange};
use crate::spec::refs::{
    DataKind, EventKind, InputDir, MAX_PORTS_PER_KIND, OutputDir, PortId, SpecRange, SpecRef,
};
use crate::spec::value::DataType;

/// Name collector shared by the event and data sub-builders. Supports either
/// a statically allocated list or an incrementally grown dynamic one.
struct NameListBuilder {
    max: usize,
    static_list: Option<&'static [&'static str]>,
    dynamic: Vec<String>,
}

impl NameListBuilder {
    fn new(max: usize) -> Self {
        Self {
            max,
            static_list: None,
            dynamic: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        match self.static_list {
            Some(s) => s.len(),
            None => self.dynamic.len(),
        }
    }

    /// Appends a name; `None` on capacity exhaustion or when a static list
    /// was already installed.
    fn add(&mut self, name: String) -> Option<usize> {
        if self.static_list.is_some() || self.len() >= self.max {
            return None;
        }
        self.dynamic.push(name);
        Some(self.dynamic.len() - 1)
    }

    fn set_static(&mut self, list: &'static [&'static str]) -> bool {
        if !self.dynamic.is_empty() || list.len() > self.max {
            return false;
        }
        self.static_list = Some(list);
        true
    }

    fn find(&self, name: &str) -> Option<usize> {
        match self.static_list {
            Some(s) => s.iter().position(|n| *n == name),
            None => self.dynamic.iter().position(|n| n == name),
        }
    }

    fn is_good(&self) -> bool {
        self.len() <= self.max
    }

    fn build(&self) -> NameList {
        match self.static_list {
            Some(s) => NameList::Static(s),
            None => NameList::Dynamic(self.dynamic.clone()),
        }
    }
}

/// Event-port sub-builder, direction-tagged so input and output references
/// cannot be mixed.
pub struct EventSpecBuilder<D> {
    names: NameListBuilder,
    good: bool,
    _dir: PhantomData<D>,
}

impl<D> Default for EventSpecBuilder<D> {
    fn default() -> Self {
        Self {
            names: NameListBuilder::new(MAX_PORTS_PER_KIND),
            good: true,
            _dir: PhantomData,
        }
    }
}

impl<D> EventSpecBuilder<D> {
    /// Adds one event port. On failure the builder is poisoned and an
    /// invalid reference is returned; the call chain may continue.
    pub fn add(&mut self, name: &str) -> SpecRef<EventKind, D> {
        if !self.good {
            return SpecRef::invalid();
        }
        match self.names.add(name.to_owned()) {
            Some(i) => SpecRef::from_index(i),
            None => {
                self.good = false;
                SpecRef::invalid()
            }
        }
    }

    /// Adds `count` numbered ports `<prefix>1..<prefix>count`.
    pub fn add_range(&mut self, prefix: &str, count: usize) -> SpecRange<EventKind, D> {
        if !self.good || count == 0 {
            self.good = false;
            return SpecRange::invalid();
        }
        let first = self.add(&format!("{prefix}1"));
        let mut last = first;
        for i in 2..=count {
            last = self.add(&format!("{prefix}{i}"));
        }
        if first.is_valid() && last.is_valid() {
            SpecRange::new(first, last)
        } else {
            SpecRange::invalid()
        }
    }

    /// Installs a statically allocated name list.
    pub fn set_static(&mut self, names: &'static [&'static str]) {
        if !self.names.set_static(names) {
            self.good = false;
        }
    }

    pub fn find(&self, name: &str) -> SpecRef<EventKind, D> {
        match self.names.find(name) {
            Some(i) => SpecRef::from_index(i),
            None => SpecRef::invalid(),
        }
    }

    pub fn num_events(&self) -> usize {
        self.names.len()
    }

    pub fn is_good(&self) -> bool {
        self.good && self.names.is_good()
    }
}

/// Data-port sub-builder keeping names and declared types in lock-step.
pub struct DataSpecBuilder<D> {
    names: NameListBuilder,
    types: Vec<DataType>,
    static_types: Option<&'static [DataType]>,
    good: bool,
    _dir: PhantomData<D>,
}

impl<D> Default for DataSpecBuilder<D> {
    fn default() -> Self {
        Self {
            names: NameListBuilder::new(MAX_PORTS_PER_KIND),
            types: Vec::new(),
            static_types: None,
            good: true,
            _dir: PhantomData,
        }
    }
}

impl<D> DataSpecBuilder<D> {
    pub fn add(&mut self, name: &str, ty: DataType) -> SpecRef<DataKind, D> {
        if !self.good {
            return SpecRef::invalid();
        }
        match self.names.add(name.to_owned()) {
            Some(i) => {
                self.types.push(ty);
                SpecRef::from_index(i)
            }
            None => {
                self.good = false;
                SpecRef::invalid()
            }
        }
    }

    /// Adds `count` numbered ports `<prefix>1..<prefix>count` of one type.
    pub fn add_range(&mut self, prefix: &str, count: usize, ty: DataType) -> SpecRange<DataKind, D> {
        if !self.good || count == 0 {
            self.good = false;
            return SpecRange::invalid();
        }
        let first = self.add(&format!("{prefix}1"), ty);
        let mut last = first;
        for i in 2..=count {
            last = self.add(&format!("{prefix}{i}"), ty);
        }
        if first.is_valid() && last.is_valid() {
            SpecRange::new(first, last)
        } else {
            SpecRange::invalid()
        }
    }

    /// Installs statically allocated name and type lists (same length).
    pub fn set_static(&mut self, names: &'static [&'static str], types: &'static [DataType]) {
        if names.len() != types.len() || !self.names.set_static(names) {
            self.good = false;
            return;
        }
        self.static_types = Some(types);
    }

    pub fn find(&self, name: &str) -> SpecRef<DataKind, D> {
        match self.names.find(name) {
            Some(i) => SpecRef::from_index(i),
            None => SpecRef::invalid(),
        }
    }

    pub fn num_data(&self) -> usize {
        self.names.len()
    }

    pub fn is_good(&self) -> bool {
        self.good && self.names.is_good()
    }

    fn build_types(&self) -> TypeList {
        match self.static_types {
            Some(s) => TypeList::Static(s),
            None => TypeList::Dynamic(self.types.clone()),
        }
    }
}

/// With-binding sub-builder. Bindings are contiguous ranges; consecutive
/// binds against the same event must extend the range without gaps.
pub struct WithSpecBuilder<D> {
    ranges: AHashMap<PortId, WithRange>,
    good: bool,
    _dir: PhantomData<D>,
}

impl<D> Default for WithSpecBuilder<D> {
    fn default() -> Self {
        Self {
            ranges: AHashMap::new(),
            good: true,
            _dir: PhantomData,
        }
    }
}

impl<D> WithSpecBuilder<D> {
    fn poison(&mut self) {
        self.good = false;
    }

    fn bind_one(&mut self, event: PortId, data: PortId) {
        self.bind_span(event, data, data);
    }

    fn bind_span(&mut self, event: PortId, first: PortId, last: PortId) {
        if !self.good || first > last {
            self.good = false;
            return;
        }
        match self.ranges.get_mut(&event) {
            None => {
                self.ranges.insert(event, WithRange { first, last });
            }
            // Extending an existing binding must keep it contiguous.
            Some(range) if first == range.last + 1 => range.last = last,
            Some(_) => self.good = false,
        }
    }

    pub fn is_good(&self) -> bool {
        self.good
    }

    fn build(&self, num_events: usize, num_data: usize) -> Result<Vec<Option<WithRange>>, SpecError> {
        let mut table = vec![None; num_events];
        for (&event, &range) in &self.ranges {
            let slot = table
                .get_mut(event as usize)
                .ok_or(SpecError::InvalidDeclaration)?;
            if range.last as usize >= num_data {
                return Err(SpecError::InvalidDeclaration);
            }
            *slot = Some(range);
        }
        Ok(table)
    }
}

/// Binding operand accepted by [`SpecBuilder::bind`]: a single data port,
/// an ordered contiguous list, or a whole range.
pub trait WithTarget<D> {
    fn apply(self, withs: &mut WithSpecBuilder<D>, event: PortId);
}

impl<D> WithTarget<D> for SpecRef<DataKind, D> {
    fn apply(self, withs: &mut WithSpecBuilder<D>, event: PortId) {
        match self.index() {
            Some(i) => withs.bind_one(event, i as PortId),
            None => withs.poison(),
        }
    }
}

impl<D> WithTarget<D> for SpecRange<DataKind, D> {
    fn apply(self, withs: &mut WithSpecBuilder<D>, event: PortId) {
        if self.is_valid() {
            withs.bind_span(event, self.first.id(), self.last.id());
        } else {
            withs.poison();
        }
    }
}

impl<D> WithTarget<D> for &[SpecRef<DataKind, D>] {
    fn apply(self, withs: &mut WithSpecBuilder<D>, event: PortId) {
        if self.is_empty() {
            withs.poison();
            return;
        }
        for r in self {
            r.apply(withs, event);
        }
    }
}

impl<D, const N: usize> WithTarget<D> for [SpecRef<DataKind, D>; N] {
    fn apply(self, withs: &mut WithSpecBuilder<D>, event: PortId) {
        self.as_slice().apply(withs, event);
    }
}

/// Adapter sub-builder registering composite socket/plug ports.
pub struct AdapterSpecBuilder {
    adapters: Vec<AdapterDef>,
    good: bool,
}

impl Default for AdapterSpecBuilder {
    fn default() -> Self {
        Self {
            adapters: Vec::new(),
            good: true,
        }
    }
}

impl AdapterSpecBuilder {
    /// Registers a composite port with explicit direction.
    pub fn add(&mut self, name: &str, type_name: &str, is_plug: bool) -> Option<PortId> {
        if self.adapters.len() >= MAX_PORTS_PER_KIND {
            self.good = false;
            return None;
        }
        self.adapters.push(AdapterDef {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            is_plug,
        });
        Some((self.adapters.len() - 1) as PortId)
    }

    /// Socket: the input-like adapter direction.
    pub fn add_socket(&mut self, name: &str, type_name: &str) -> Option<PortId> {
        self.add(name, type_name, false)
    }

    /// Plug: the output-like adapter direction.
    pub fn add_plug(&mut self, name: &str, type_name: &str) -> Option<PortId> {
        self.add(name, type_name, true)
    }

    pub fn num_adapters(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_good(&self) -> bool {
        self.good
    }
}

/// Selects the with-table matching an event reference's direction.
pub trait DirSelect: Sized {
    fn withs(builder: &mut SpecBuilder) -> &mut WithSpecBuilder<Self>;
}

impl DirSelect for InputDir {
    fn withs(builder: &mut SpecBuilder) -> &mut WithSpecBuilder<InputDir> {
        &mut builder.withs_in
    }
}

impl DirSelect for OutputDir {
    fn withs(builder: &mut SpecBuilder) -> &mut WithSpecBuilder<OutputDir> {
        &mut builder.withs_out
    }
}

/// Incremental builder compiling a block type's port and binding
/// declarations into an immutable [`PortSpec`].
///
/// The builder is poisoned by the first invalid operand: every later call is
/// a no-op returning an invalid sentinel, so long declaration chains need a
/// single [`SpecBuilder::is_good`] check at the end, which also gates
/// [`SpecBuilder::build`]. Side effects applied before the poisoning call may
/// remain visible in the partial state but can never become a live spec.
pub struct SpecBuilder {
    pub events_in: EventSpecBuilder<InputDir>,
    pub events_out: EventSpecBuilder<OutputDir>,
    pub data_in: DataSpecBuilder<InputDir>,
    pub data_out: DataSpecBuilder<OutputDir>,
    pub adapters: AdapterSpecBuilder,
    withs_in: WithSpecBuilder<InputDir>,
    withs_out: WithSpecBuilder<OutputDir>,
}

impl Default for SpecBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecBuilder {
    pub fn new() -> Self {
        Self {
            events_in: EventSpecBuilder::default(),
            events_out: EventSpecBuilder::default(),
            data_in: DataSpecBuilder::default(),
            data_out: DataSpecBuilder::default(),
            adapters: AdapterSpecBuilder::default(),
            withs_in: WithSpecBuilder::default(),
            withs_out: WithSpecBuilder::default(),
        }
    }

    /// Binds an event to data ports of the same direction. Invalid operands
    /// poison the builder instead of aborting the call chain.
    pub fn bind<D: DirSelect>(
        &mut self,
        event: SpecRef<EventKind, D>,
        target: impl WithTarget<D>,
    ) {
        let withs = D::withs(self);
        match event.index() {
            Some(i) => target.apply(withs, i as PortId),
            None => withs.poison(),
        }
    }

    /// True while no declaration has failed and all counts are in capacity.
    pub fn is_good(&self) -> bool {
        self.events_in.is_good()
            && self.events_out.is_good()
            && self.data_in.is_good()
            && self.data_out.is_good()
            && self.withs_in.is_good()
            && self.withs_out.is_good()
            && self.adapters.is_good()
    }

    /// Compiles the declarations into a [`PortSpec`].
    ///
    /// Succeeds iff every add/bind call had valid operands and the total port
    /// counts stayed within capacity.
    pub fn build(&self) -> Result<PortSpec, SpecError> {
        if !self.events_in.names.is_good()
            || !self.events_out.names.is_good()
            || !self.data_in.names.is_good()
            || !self.data_out.names.is_good()
            || self.adapters.adapters.len() > MAX_PORTS_PER_KIND
        {
            return Err(SpecError::Capacity);
        }
        if !self.is_good() {
            return Err(SpecError::InvalidDeclaration);
        }
        let input_withs = self
            .withs_in
            .build(self.events_in.num_events(), self.data_in.num_data())?;
        let output_withs = self
            .withs_out
            .build(self.events_out.num_events(), self.data_out.num_data())?;
        Ok(PortSpec {
            event_input_names: self.events_in.names.build(),
            event_output_names: self.events_out.names.build(),
            data_input_names: self.data_in.names.build(),
            data_input_types: self.data_in.build_types(),
            data_output_names: self.data_out.names.build(),
            data_output_types: self.data_out.build_types(),
            input_withs,
            output_withs,
            adapters: self.adapters.adapters.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::refs::DataInRef;

    #[test]
    fn build_succeeds_with_valid_declarations() {
        let mut b = SpecBuilder::new();
        let init = b.events_in.add("INIT");
        let req = b.events_in.add("REQ");
        b.events_out.add("INITO");
        let qi = b.data_in.add("QI", DataType::Bool);
        b.bind(init, qi);
        b.bind(req, qi);
        assert!(init.is_valid() && req.is_valid() && qi.is_valid());
        assert!(b.is_good());
        let spec = b.build().expect("build");
        assert_eq!(spec.num_event_inputs(), 2);
        assert_eq!(spec.num_event_outputs(), 1);
        assert_eq!(
            spec.input_with(init.id()),
            Some(WithRange { first: 0, last: 0 })
        );
    }

    #[test]
    fn invalid_bind_operand_poisons_builder() {
        let mut b = SpecBuilder::new();
        let init = b.events_in.add("INIT");
        b.bind(init, DataInRef::invalid());
        assert!(!b.is_good());
        assert_eq!(b.build().unwrap_err(), SpecError::InvalidDeclaration);
    }

    #[test]
    fn poisoned_builder_keeps_returning_sentinels() {
        let mut b = SpecBuilder::new();
        let bad = b.events_in.add_range("EI", 0);
        assert!(!bad.is_valid());
        // Later calls are no-ops returning invalid references.
        let after = b.events_in.add("LATE");
        assert!(!after.is_valid());
        assert!(b.build().is_err());
    }

    #[test]
    fn range_binding_round_trips() {
        let mut b = SpecBuilder::new();
        let req = b.events_in.add("REQ");
        let ins = b.data_in.add_range("IN", 4, DataType::Int);
        assert_eq!(ins.len(), 4);
        b.bind(req, ins);
        let spec = b.build().expect("build");
        let with = spec.input_with(req.id()).expect("with");
        assert_eq!((with.first, with.last), (ins.first.id(), ins.last.id()));
    }

    #[test]
    fn non_contiguous_binding_is_rejected() {
        let mut b = SpecBuilder::new();
        let req = b.events_in.add("REQ");
        let a = b.data_in.add("A", DataType::Bool);
        let _b_port = b.data_in.add("B", DataType::Bool);
        let c = b.data_in.add("C", DataType::Bool);
        b.bind(req, a);
        b.bind(req, c); // gap: B was skipped
        assert!(!b.is_good());
    }

    #[test]
    fn capacity_exhaustion_fails_closed() {
        let mut b = SpecBuilder::new();
        for i in 0..MAX_PORTS_PER_KIND {
            assert!(b.events_in.add(&format!("E{i}")).is_valid());
        }
        let over = b.events_in.add("OVERFLOW");
        assert!(!over.is_valid());
        assert_eq!(b.build().unwrap_err(), SpecError::Capacity);
    }

    #[test]
    fn static_lists_share_backing_storage() {
        static EI: [&str; 2] = ["INIT", "REQ"];
        static DI_NAMES: [&str; 1] = ["QI"];
        static DI_TYPES: [DataType; 1] = [DataType::Bool];
        let mut b = SpecBuilder::new();
        b.events_in.set_static(&EI);
        b.data_in.set_static(&DI_NAMES, &DI_TYPES);
        let init = b.events_in.find("INIT");
        b.bind(init, b.data_in.find("QI"));
        let spec = b.build().expect("build");
        assert_eq!(spec.find_event_input("REQ").id(), 1);
        assert_eq!(spec.data_input_type(0), Some(DataType::Bool));
    }

    #[test]
    fn adapter_registration_records_direction() {
        let mut b = SpecBuilder::new();
        b.adapters.add_socket("TimeOutSocket", "ATimeOut");
        b.adapters.add_plug("Out", "AOut");
        let spec = b.build().expect("build");
        assert_eq!(spec.num_adapters(), 2);
        assert!(!spec.adapter(0).unwrap().is_plug);
        assert!(spec.adapter(1).unwrap().is_plug);
    }
}
