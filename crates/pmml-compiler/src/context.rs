//! `ConversionContext` (spec.md §4.2): scoped symbol tables feeding the
//! `AstBuilder` — the data dictionary, the mining-schema stack, the
//! transformation dictionary, the custom-function table, and the
//! scoped-name allocator.

use indexmap::IndexMap;
use std::collections::HashSet;

use pmml_core::{FieldArena, FieldId, FieldOrigin, FieldType, Interner, NameAllocator, OpType, Symbol};

use crate::error::CompileError;

/// Outlier treatment for a mining field, read from the `outliers` attribute
/// (spec.md §4.3 "Mining-field `field(mining-field)` expansion").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierTreatment {
    AsIs,
    AsMissingValues,
    AsExtremeValues,
}

/// A model-scoped declaration of an input field: outlier/replacement
/// metadata layered on top of its `FieldDescription` (spec.md §3
/// "Mining-schema stack guard").
#[derive(Debug, Clone)]
pub struct MiningField {
    pub field: FieldId,
    pub outlier_treatment: OutlierTreatment,
    pub low_value: Option<f64>,
    pub high_value: Option<f64>,
    pub replacement_value: Option<String>,
}

impl MiningField {
    pub fn new(field: FieldId) -> Self {
        Self {
            field,
            outlier_treatment: OutlierTreatment::AsIs,
            low_value: None,
            high_value: None,
            replacement_value: None,
        }
    }
}

/// A mining schema: `field name -> MiningField`, active for the duration of
/// one model's parse (spec.md §3).
pub type MiningSchema = IndexMap<Symbol, MiningField>;

/// One entry in the custom-function table: a PMML-declared `DefineFunction`,
/// recording its result type, parameter types, and the `FieldId` holding
/// its compiled lambda (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct CustomFunction {
    pub result_type: FieldType,
    pub parameter_types: Vec<FieldType>,
    pub lambda_field: FieldId,
}

/// Erases every field registered within its lifetime from the data
/// dictionary on drop (spec.md §4.2 `ScopedVariableGuard`, named
/// `ScopedVariableDefinitionStackGuard` in the original). Not a full-stack
/// swap: sibling scopes may coexist during nested model parsing.
pub struct ScopedVariableGuard<'a> {
    context: &'a mut ConversionContext,
    added: Vec<(Symbol, Option<FieldId>)>,
}

impl<'a> ScopedVariableGuard<'a> {
    pub fn new(context: &'a mut ConversionContext) -> Self {
        Self {
            context,
            added: Vec::new(),
        }
    }

    /// Add a new data field to the dictionary, tracked for removal when
    /// this guard drops.
    pub fn add_data_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        origin: FieldOrigin,
        op_type: OpType,
    ) -> FieldId {
        let sym = self.context.interner.intern(name);
        let previous = self.context.data_dictionary.get(&sym).copied();
        let field = self.context.declare_field(name, field_type, op_type, origin);
        self.context.data_dictionary.insert(sym, field);
        self.added.push((sym, previous));
        field
    }

    pub fn context(&mut self) -> &mut ConversionContext {
        self.context
    }
}

impl Drop for ScopedVariableGuard<'_> {
    fn drop(&mut self) {
        for (sym, previous) in self.added.drain(..) {
            match previous {
                Some(prev) => {
                    self.context.data_dictionary.insert(sym, prev);
                }
                None => {
                    self.context.data_dictionary.shift_remove(&sym);
                }
            }
        }
    }
}

/// Swaps `ConversionContext`'s active mining schema for a new one on
/// construction, restoring the previous on drop (spec.md §3 "Mining-schema
/// stack guard"). Nested model parsing nests these guards, so the same
/// derived field may resolve to different expressions depending on the
/// enclosing model's mining discipline.
pub struct MiningSchemaGuard<'a> {
    context: &'a mut ConversionContext,
    saved: Option<MiningSchema>,
    /// Whether the guard actually swapped a schema in: a scope may be
    /// entered before its schema is known to be well-formed.
    is_valid: bool,
    pub target_field: Option<FieldId>,
}

impl<'a> MiningSchemaGuard<'a> {
    pub fn new(context: &'a mut ConversionContext, new_schema: MiningSchema) -> Self {
        let saved = Some(std::mem::replace(&mut context.mining_schema, new_schema));
        Self {
            context,
            saved,
            is_valid: true,
            target_field: None,
        }
    }

    pub fn invalid(context: &'a mut ConversionContext) -> Self {
        Self {
            context,
            saved: None,
            is_valid: false,
            target_field: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn context(&mut self) -> &mut ConversionContext {
        self.context
    }
}

impl Drop for MiningSchemaGuard<'_> {
    fn drop(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.context.mining_schema = saved;
        }
    }
}

/// Scoped symbol tables feeding the `AstBuilder`: the data dictionary, the
/// active mining schema, named input/output/neuron views, the
/// transformation dictionary, the custom-function table, and the unique-
/// name allocator (spec.md §4.2).
pub struct ConversionContext {
    fields: FieldArena,
    allocator: NameAllocator,
    interner: Interner,
    data_dictionary: IndexMap<Symbol, FieldId>,
    mining_schema: MiningSchema,
    inputs: IndexMap<Symbol, FieldId>,
    outputs: IndexMap<Symbol, FieldId>,
    neurons: IndexMap<String, FieldId>,
    /// Global mapping `name -> AstNode template`, populated once by the
    /// transformation-dictionary parser and re-imported per model
    /// (spec.md §3 "Transformation dictionary").
    transformation_templates: IndexMap<Symbol, pmml_core::AstNode>,
    custom_functions: IndexMap<Symbol, CustomFunction>,
    /// Whether templates are currently being parsed into the
    /// transformation dictionary, so re-import may reference templates
    /// not yet fully declared (spec.md §4.2).
    loading_transformation_dictionary: bool,
    /// The PMML header's producing-application string, consulted by the
    /// `JPMML-SkLearn` `mapMissingTo`/`defaultValue` quirk (spec.md §9
    /// Open Questions) — stored and exposed verbatim, not "fixed".
    application: Option<String>,
    active_fields: HashSet<Symbol>,
}

impl Default for ConversionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionContext {
    pub fn new() -> Self {
        Self {
            fields: FieldArena::new(),
            allocator: NameAllocator::new(),
            interner: Interner::new(),
            data_dictionary: IndexMap::new(),
            mining_schema: IndexMap::new(),
            inputs: IndexMap::new(),
            outputs: IndexMap::new(),
            neurons: IndexMap::new(),
            transformation_templates: IndexMap::new(),
            custom_functions: IndexMap::new(),
            loading_transformation_dictionary: false,
            application: None,
            active_fields: HashSet::new(),
        }
    }

    pub fn fields(&self) -> &FieldArena {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut FieldArena {
        &mut self.fields
    }

    fn declare_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        op_type: OpType,
        origin: FieldOrigin,
    ) -> FieldId {
        let emitted = self.allocator.allocate(name);
        let sym = self.interner.intern(name);
        self.fields
            .declare(emitted, Some(sym), field_type, op_type, origin)
    }

    /// Declare a field outside any scope (lives for the whole compilation —
    /// used for the data dictionary's top-level inputs/outputs).
    pub fn add_unscoped_field(
        &mut self,
        name: &str,
        field_type: FieldType,
        op_type: OpType,
        origin: FieldOrigin,
    ) -> FieldId {
        let field = self.declare_field(name, field_type, op_type, origin);
        let sym = self.interner.intern(name);
        self.data_dictionary.insert(sym, field);
        field
    }

    /// Allocate a variable not registered in the data dictionary under any
    /// PMML name (a temporary or a lambda parameter).
    pub fn create_variable(
        &mut self,
        field_type: FieldType,
        name: &str,
        origin: FieldOrigin,
    ) -> FieldId {
        self.declare_field(name, field_type, OpType::Invalid, origin)
    }

    pub fn get_field_description(&self, name: &str) -> Option<FieldId> {
        let sym = self.interner.get(name)?;
        self.data_dictionary.get(&sym).copied()
    }

    pub fn scoped_variable_guard(&mut self) -> ScopedVariableGuard<'_> {
        ScopedVariableGuard::new(self)
    }

    /// Seed the data dictionary's active input set from the driver's
    /// pre-scan (spec.md §4.7 step 1/2).
    pub fn setup_inputs(
        &mut self,
        inputs: &[(String, FieldType, OpType)],
        active_fields: &HashSet<String>,
        out_fields: &HashSet<String>,
    ) {
        for (name, field_type, op_type) in inputs {
            if active_fields.contains(name) {
                self.add_unscoped_field(name, *field_type, *op_type, FieldOrigin::DataDictionary);
                let sym = self.interner.intern(name);
                self.active_fields.insert(sym);
                let field = self.data_dictionary[&sym];
                self.inputs.insert(sym, field);
            } else if out_fields.contains(name) {
                let field = self.add_unscoped_field(name, *field_type, *op_type, FieldOrigin::Output);
                let sym = self.interner.intern(name);
                self.outputs.insert(sym, field);
            }
        }
    }

    pub fn setup_outputs(&mut self, outputs: &[(String, FieldType, OpType)]) {
        for (name, field_type, op_type) in outputs {
            if *field_type != FieldType::Invalid {
                let field = self.add_unscoped_field(name, *field_type, *op_type, FieldOrigin::Output);
                let sym = self.interner.intern(name);
                self.outputs.insert(sym, field);
            }
        }
    }

    pub fn inputs(&self) -> &IndexMap<Symbol, FieldId> {
        &self.inputs
    }

    pub fn outputs(&self) -> &IndexMap<Symbol, FieldId> {
        &self.outputs
    }

    pub fn mark_neuron(&mut self, neuron_id: impl Into<String>, field: FieldId) {
        self.neurons.insert(neuron_id.into(), field);
    }

    pub fn find_neuron(&self, neuron_id: &str) -> Option<FieldId> {
        self.neurons.get(neuron_id).copied()
    }

    pub fn mining_schema(&self) -> &MiningSchema {
        &self.mining_schema
    }

    pub fn mining_schema_mut(&mut self) -> &mut MiningSchema {
        &mut self.mining_schema
    }

    pub fn enter_mining_schema(&mut self, new_schema: MiningSchema) -> MiningSchemaGuard<'_> {
        MiningSchemaGuard::new(self, new_schema)
    }

    pub fn declare_transformation_template(&mut self, name: &str, template: pmml_core::AstNode) {
        let sym = self.interner.intern(name);
        self.transformation_templates.insert(sym, template);
    }

    pub fn find_transformation_template(&self, name: &str) -> Option<&pmml_core::AstNode> {
        let sym = self.interner.get(name)?;
        self.transformation_templates.get(&sym)
    }

    pub fn is_loading_transformation_dictionary(&self) -> bool {
        self.loading_transformation_dictionary
    }

    pub fn set_loading_transformation_dictionary(&mut self, loading: bool) {
        self.loading_transformation_dictionary = loading;
    }

    pub fn declare_custom_function(&mut self, pmml_name: &str, custom: CustomFunction) {
        let sym = self.interner.intern(pmml_name);
        self.custom_functions.insert(sym, custom);
    }

    pub fn find_custom_function(&self, pmml_name: &str) -> Result<&CustomFunction, CompileError> {
        let sym = self
            .interner
            .get(pmml_name)
            .filter(|s| self.custom_functions.contains_key(s));
        match sym {
            Some(sym) => Ok(&self.custom_functions[&sym]),
            None => Err(CompileError::UnknownReference {
                what: "custom function".into(),
                name: pmml_name.to_string(),
                line: 0,
            }),
        }
    }

    pub fn application(&self) -> Option<&str> {
        self.application.as_deref()
    }

    pub fn set_application(&mut self, application: impl Into<String>) {
        self.application = Some(application.into());
    }

    /// The `JPMML-SkLearn` quirk (spec.md §9 Open Questions): the
    /// mining-field parser reads a replacement value under the
    /// `defaultValue` XML attribute key instead of `mapMissingTo` when the
    /// document's producing application is exactly `JPMML-SkLearn`.
    /// Preserved verbatim, not "fixed".
    pub fn missing_value_replacement_attribute_key(&self) -> &'static str {
        if self.application.as_deref() == Some("JPMML-SkLearn") {
            "defaultValue"
        } else {
            "mapMissingTo"
        }
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn interner_mut(&mut self) -> &mut Interner {
        &mut self.interner
    }
}
