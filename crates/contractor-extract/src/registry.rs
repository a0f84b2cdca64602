//! Contract method registry.
//!
//! [`ContractRegistry`] is resolved once per extraction session from the unit
//! and configuration, then passed by reference to every component. It
//! answers the two classification questions the extractor asks of a call:
//! is it a *scan trigger* (something that belongs to the contract section)
//! and, if so, which clause builder handles it ([`ScanTrigger`]).

use std::collections::{HashMap, HashSet};

use contractor_core::member::{find_attribute, full_name};
use contractor_core::{
    Call, CoreError, MethodDef, MethodId, MethodRef, Param, TypeId, TypeKind, TypeRef, Unit,
};
use serde::{Deserialize, Serialize};

use crate::config::ExtractorConfig;
use crate::diagnostics::{report, ExtractionDiagnostic};
use crate::error::ExtractError;

/// Well-known marker attribute names.
pub mod attrs {
    pub const PURE: &str = "System.Diagnostics.Contracts.PureAttribute";
    pub const INVARIANT_METHOD: &str =
        "System.Diagnostics.Contracts.ContractInvariantMethodAttribute";
    pub const CONTRACT_CLASS: &str = "System.Diagnostics.Contracts.ContractClassAttribute";
    pub const CONTRACT_CLASS_FOR: &str = "System.Diagnostics.Contracts.ContractClassForAttribute";
    pub const ARGUMENT_VALIDATOR: &str =
        "System.Diagnostics.Contracts.ContractArgumentValidatorAttribute";
    pub const ABBREVIATOR: &str = "System.Diagnostics.Contracts.ContractAbbreviatorAttribute";
    pub const REFERENCE_ASSEMBLY: &str =
        "System.Diagnostics.Contracts.ContractReferenceAssemblyAttribute";
}

/// The members of the contract-method family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractMethod {
    Requires,
    Ensures,
    EnsuresOnThrow,
    Invariant,
    Assert,
    Assume,
    EndContractBlock,
    Result,
    OldValue,
    ValueAtReturn,
}

impl ContractMethod {
    pub const ALL: [ContractMethod; 10] = [
        ContractMethod::Requires,
        ContractMethod::Ensures,
        ContractMethod::EnsuresOnThrow,
        ContractMethod::Invariant,
        ContractMethod::Assert,
        ContractMethod::Assume,
        ContractMethod::EndContractBlock,
        ContractMethod::Result,
        ContractMethod::OldValue,
        ContractMethod::ValueAtReturn,
    ];

    /// Simple method name on the contract class.
    pub fn name(self) -> &'static str {
        match self {
            ContractMethod::Requires => "Requires",
            ContractMethod::Ensures => "Ensures",
            ContractMethod::EnsuresOnThrow => "EnsuresOnThrow",
            ContractMethod::Invariant => "Invariant",
            ContractMethod::Assert => "Assert",
            ContractMethod::Assume => "Assume",
            ContractMethod::EndContractBlock => "EndContractBlock",
            ContractMethod::Result => "Result",
            ContractMethod::OldValue => "OldValue",
            ContractMethod::ValueAtReturn => "ValueAtReturn",
        }
    }

    pub fn from_name(name: &str) -> Option<ContractMethod> {
        ContractMethod::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Assertion calls appear as statements; the value helpers (`Result`,
    /// `OldValue`, `ValueAtReturn`) only ever appear inside conditions.
    pub fn is_statement(self) -> bool {
        !matches!(
            self,
            ContractMethod::Result | ContractMethod::OldValue | ContractMethod::ValueAtReturn
        )
    }
}

/// Why the scanner stopped at a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTrigger {
    /// A call to a contract assertion method.
    Contract(ContractMethod),
    /// A call to a `[ContractArgumentValidator]` method.
    Validator(MethodId),
    /// A call to a `[ContractAbbreviator]` method.
    Abbreviator(MethodId),
}

/// Session-scoped lookup tables for contract recognition.
#[derive(Debug, Clone)]
pub struct ContractRegistry {
    contract_classes: Vec<TypeId>,
    methods: HashMap<MethodId, ContractMethod>,
    validators: HashSet<MethodId>,
    abbreviators: HashSet<MethodId>,
    /// Interface or abstract type -> the class that carries its contracts.
    contract_class_of: HashMap<TypeId, TypeId>,
    reference_assembly: bool,
    diagnostics: Vec<ExtractionDiagnostic>,
}

impl ContractRegistry {
    /// Resolves contract classes, validators, abbreviators and contract-class
    /// links from `unit`.
    pub fn new(unit: &Unit, config: &ExtractorConfig) -> Self {
        let mut diagnostics = Vec::new();

        let contract_classes: Vec<TypeId> = config
            .contract_classes
            .iter()
            .filter_map(|name| unit.find_type(name))
            .collect();

        let mut methods = HashMap::new();
        for &class in &contract_classes {
            for m in unit.methods_of(class) {
                if let Some(cm) = ContractMethod::from_name(&m.name) {
                    methods.insert(m.id, cm);
                }
            }
        }

        let mut validators = HashSet::new();
        let mut abbreviators = HashSet::new();
        for m in unit.methods() {
            if m.has_attribute(attrs::ARGUMENT_VALIDATOR) {
                validators.insert(m.id);
            } else if m.has_attribute(attrs::ABBREVIATOR) {
                abbreviators.insert(m.id);
            }
        }

        let mut contract_class_of = HashMap::new();
        for ty in unit.types() {
            if let Some(attr) = find_attribute(&ty.attributes, attrs::CONTRACT_CLASS_FOR) {
                if let Some(target) = attr.type_arg().and_then(TypeRef::definition) {
                    contract_class_of.insert(target, ty.id);
                }
            }
        }
        for ty in unit.types() {
            let Some(attr) = find_attribute(&ty.attributes, attrs::CONTRACT_CLASS) else {
                continue;
            };
            let resolved = attr
                .type_arg()
                .and_then(TypeRef::definition)
                .filter(|id| unit.type_def(*id).is_some());
            match resolved {
                Some(class) => {
                    contract_class_of.insert(ty.id, class);
                }
                None => report(
                    &mut diagnostics,
                    ExtractionDiagnostic::MissingContractClass {
                        ty: ty.id,
                        target: attr
                            .type_arg()
                            .map(|t| t.to_string())
                            .unwrap_or_else(|| "<none>".to_string()),
                    },
                ),
            }
        }

        let reference_assembly = config
            .reference_assembly
            .unwrap_or_else(|| unit.has_attribute(attrs::REFERENCE_ASSEMBLY));

        tracing::debug!(
            classes = contract_classes.len(),
            contract_methods = methods.len(),
            validators = validators.len(),
            abbreviators = abbreviators.len(),
            reference_assembly,
            "resolved contract registry"
        );

        ContractRegistry {
            contract_classes,
            methods,
            validators,
            abbreviators,
            contract_class_of,
            reference_assembly,
            diagnostics,
        }
    }

    /// Classifies a method definition as a contract-family member.
    pub fn classify(&self, method: MethodId) -> Option<ContractMethod> {
        self.methods.get(&method).copied()
    }

    /// Classifies the callee of `call`. Instance calls are never contract calls.
    pub fn classify_call(&self, call: &Call) -> Option<ContractMethod> {
        if call.receiver.is_some() {
            return None;
        }
        self.classify(call.callee.method)
    }

    /// First-level classification used by the scanner.
    pub fn scan_trigger(&self, call: &Call) -> Option<ScanTrigger> {
        if let Some(cm) = self.classify_call(call) {
            return cm.is_statement().then_some(ScanTrigger::Contract(cm));
        }
        let id = call.callee.method;
        if self.validators.contains(&id) {
            Some(ScanTrigger::Validator(id))
        } else if self.abbreviators.contains(&id) {
            Some(ScanTrigger::Abbreviator(id))
        } else {
            None
        }
    }

    pub fn is_validator(&self, method: MethodId) -> bool {
        self.validators.contains(&method)
    }

    pub fn is_abbreviator(&self, method: MethodId) -> bool {
        self.abbreviators.contains(&method)
    }

    pub fn is_contract_class(&self, ty: TypeId) -> bool {
        self.contract_classes.contains(&ty)
    }

    /// Whether conditions carry their source text as a literal third argument.
    pub fn is_reference_assembly(&self) -> bool {
        self.reference_assembly
    }

    /// The class holding contracts for interface or abstract type `ty`.
    pub fn contract_class_of(&self, ty: TypeId) -> Option<TypeId> {
        self.contract_class_of.get(&ty).copied()
    }

    /// Diagnostics raised while resolving the registry.
    pub fn diagnostics(&self) -> &[ExtractionDiagnostic] {
        &self.diagnostics
    }

    /// Finds the contract-class overload of `cm` with `arity` parameters,
    /// instantiated with `method_args`.
    ///
    /// Used by the injector; the overload must be generic exactly when
    /// `method_args` is non-empty.
    pub fn method_ref(
        &self,
        unit: &Unit,
        cm: ContractMethod,
        arity: usize,
        method_args: &[TypeRef],
    ) -> Result<MethodRef, ExtractError> {
        self.contract_classes
            .iter()
            .flat_map(|&class| unit.methods_of(class))
            .find(|m| {
                m.name == cm.name()
                    && m.arity() == arity
                    && m.generic_params.len() == method_args.len()
                    && self.methods.contains_key(&m.id)
            })
            .map(|m| m.reference().with_method_args(method_args.iter().cloned()))
            .ok_or_else(|| ExtractError::MissingContractMethod {
                name: cm.name().to_string(),
                arity,
            })
    }
}

/// Adds `System.Diagnostics.Contracts.Contract` and its static methods to
/// `unit` unless a type of that name already exists. Returns the class.
pub fn declare_contract_class(unit: &mut Unit) -> Result<TypeId, CoreError> {
    const NAMESPACE: &str = "System.Diagnostics.Contracts";
    const NAME: &str = "Contract";

    if let Some(existing) = unit.find_type(&full_name(NAMESPACE, NAME)) {
        return Ok(existing);
    }
    let class = unit.add_type(NAMESPACE, NAME, TypeKind::Class)?;

    let condition = || Param::new("condition", TypeRef::BOOL);
    let message = || Param::new("userMessage", TypeRef::STRING);
    let text = || Param::new("conditionText", TypeRef::STRING);
    let t = TypeRef::MethodParam(0);

    // (name, params, return type, generic parameter name)
    let mut overloads: Vec<(&str, Vec<Param>, TypeRef, Option<&str>)> = Vec::new();
    for name in ["Requires", "Ensures", "Invariant"] {
        overloads.push((name, vec![condition()], TypeRef::VOID, None));
        overloads.push((name, vec![condition(), message()], TypeRef::VOID, None));
        overloads.push((name, vec![condition(), message(), text()], TypeRef::VOID, None));
    }
    for arity in 1..=3 {
        let params = [condition(), message(), text()][..arity].to_vec();
        overloads.push(("Requires", params.clone(), TypeRef::VOID, Some("TException")));
        overloads.push(("EnsuresOnThrow", params, TypeRef::VOID, Some("TException")));
    }
    for name in ["Assert", "Assume"] {
        overloads.push((name, vec![condition()], TypeRef::VOID, None));
        overloads.push((name, vec![condition(), message()], TypeRef::VOID, None));
    }
    overloads.push(("EndContractBlock", vec![], TypeRef::VOID, None));
    overloads.push(("Result", vec![], t.clone(), Some("T")));
    overloads.push(("OldValue", vec![Param::new("value", t.clone())], t.clone(), Some("T")));
    overloads.push((
        "ValueAtReturn",
        vec![Param::new("value", t.clone().by_ref())],
        t,
        Some("T"),
    ));

    for (name, params, ret, generic) in overloads {
        let id = unit.add_method(class, name, params, ret)?;
        let method: &mut MethodDef = unit
            .method_mut(id)
            .ok_or(CoreError::MethodNotFound { id })?;
        method.flags.is_static = true;
        if let Some(g) = generic {
            method.generic_params.push(g.to_string());
        }
    }
    Ok(class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contractor_core::{Attribute, Expr};

    fn unit_with_contracts() -> (Unit, TypeId) {
        let mut unit = Unit::new("reg");
        let class = declare_contract_class(&mut unit).unwrap();
        (unit, class)
    }

    #[test]
    fn declare_is_idempotent() {
        let (mut unit, class) = unit_with_contracts();
        let count = unit.method_count();
        assert_eq!(declare_contract_class(&mut unit).unwrap(), class);
        assert_eq!(unit.method_count(), count);
    }

    #[test]
    fn classifies_contract_methods() {
        let (unit, class) = unit_with_contracts();
        let registry = ContractRegistry::new(&unit, &ExtractorConfig::default());
        assert!(registry.is_contract_class(class));

        let requires = unit.find_method(class, "Requires", 1).unwrap();
        assert_eq!(registry.classify(requires.id), Some(ContractMethod::Requires));

        let result = unit.find_method(class, "Result", 0).unwrap();
        let call = Expr::call(result.reference(), vec![]);
        // Value helpers are contract methods but not scan triggers.
        assert_eq!(
            registry.classify_call(call.as_call().unwrap()),
            Some(ContractMethod::Result)
        );
        assert_eq!(registry.scan_trigger(call.as_call().unwrap()), None);
    }

    #[test]
    fn validators_and_abbreviators_are_triggers() {
        let (mut unit, _) = unit_with_contracts();
        let helpers = unit.add_type("App", "Guard", TypeKind::Class).unwrap();
        let validator = unit
            .add_method(helpers, "NotNull", vec![Param::new("o", TypeRef::OBJECT)], TypeRef::VOID)
            .unwrap();
        unit.method_mut(validator)
            .unwrap()
            .attributes
            .push(Attribute::marker(attrs::ARGUMENT_VALIDATOR));
        let abbreviator = unit
            .add_method(helpers, "Positive", vec![Param::new("i", TypeRef::I32)], TypeRef::VOID)
            .unwrap();
        unit.method_mut(abbreviator)
            .unwrap()
            .attributes
            .push(Attribute::marker(attrs::ABBREVIATOR));

        let registry = ContractRegistry::new(&unit, &ExtractorConfig::default());
        let call = |id| Expr::call(MethodRef::new(id, "m"), vec![Expr::null()]);
        assert_eq!(
            registry.scan_trigger(call(validator).as_call().unwrap()),
            Some(ScanTrigger::Validator(validator))
        );
        assert_eq!(
            registry.scan_trigger(call(abbreviator).as_call().unwrap()),
            Some(ScanTrigger::Abbreviator(abbreviator))
        );
    }

    #[test]
    fn method_ref_selects_generic_overload() {
        let (unit, _) = unit_with_contracts();
        let registry = ContractRegistry::new(&unit, &ExtractorConfig::default());
        let plain = registry
            .method_ref(&unit, ContractMethod::Requires, 1, &[])
            .unwrap();
        let generic = registry
            .method_ref(&unit, ContractMethod::Requires, 1, &[TypeRef::OBJECT])
            .unwrap();
        assert_ne!(plain.method, generic.method);
        assert_eq!(generic.method_args.as_slice(), &[TypeRef::OBJECT]);

        let missing = registry.method_ref(&unit, ContractMethod::Assert, 3, &[]);
        assert!(matches!(
            missing,
            Err(ExtractError::MissingContractMethod { arity: 3, .. })
        ));
    }

    #[test]
    fn contract_class_links() {
        let (mut unit, _) = unit_with_contracts();
        let iface = unit.add_type("App", "IShape", TypeKind::Interface).unwrap();
        let contracts = unit.add_type("App", "IShapeContract", TypeKind::Class).unwrap();
        let broken = unit.add_type("App", "IBroken", TypeKind::Interface).unwrap();
        unit.type_mut(contracts).unwrap().attributes.push(Attribute::with_type(
            attrs::CONTRACT_CLASS_FOR,
            TypeRef::Named(iface),
        ));
        unit.type_mut(broken).unwrap().attributes.push(Attribute::with_type(
            attrs::CONTRACT_CLASS,
            TypeRef::Named(TypeId(999)),
        ));

        let registry = ContractRegistry::new(&unit, &ExtractorConfig::default());
        assert_eq!(registry.contract_class_of(iface), Some(contracts));
        assert_eq!(registry.contract_class_of(broken), None);
        assert!(matches!(
            registry.diagnostics(),
            [ExtractionDiagnostic::MissingContractClass { ty, .. }] if *ty == broken
        ));
    }

    #[test]
    fn reference_assembly_detection_and_override() {
        let (mut unit, _) = unit_with_contracts();
        let config = ExtractorConfig::default();
        assert!(!ContractRegistry::new(&unit, &config).is_reference_assembly());

        unit.attributes.push(Attribute::marker(attrs::REFERENCE_ASSEMBLY));
        assert!(ContractRegistry::new(&unit, &config).is_reference_assembly());

        let forced = ExtractorConfig {
            reference_assembly: Some(false),
            ..ExtractorConfig::default()
        };
        assert!(!ContractRegistry::new(&unit, &forced).is_reference_assembly());
    }
}
