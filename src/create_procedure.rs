//! Building the procedure a diagnostic says is missing

use crate::object::AlObject;
use crate::procedure::{clean_name, AccessModifier, AlProcedure, AlVariable, ProcedureKind};
use crate::resolver::find_variable;
use crate::source_handler::ProcedureCallSite;

/// Everything known about a call to a procedure that does not exist
#[derive(Debug, Clone)]
pub struct MissingProcedure {
    pub call: ProcedureCallSite,
    pub parameters: Vec<AlVariable>,
    pub return_type: Option<String>,
    /// Object the procedure has to be declared in
    pub target: AlObject,
    /// The call is made from the target object itself
    pub same_object: bool,
}

impl MissingProcedure {
    /// Derive signature details from the call site and the variables in scope
    pub fn analyze(
        call: ProcedureCallSite,
        variables: &[AlVariable],
        target: AlObject,
        calling_object: &AlObject,
    ) -> Self {
        let parameters = infer_parameters(&call.arguments, variables);
        let return_type = infer_return_type(&call, variables);
        let same_object = target.is_same_object(calling_object);
        Self {
            call,
            parameters,
            return_type,
            target,
            same_object,
        }
    }

    /// Line of the call, used to insert next to the calling member
    pub fn calling_line(&self) -> u32 {
        self.call.call_range.start.line
    }
}

fn infer_parameters(arguments: &[String], variables: &[AlVariable]) -> Vec<AlVariable> {
    let mut parameters: Vec<AlVariable> = Vec::with_capacity(arguments.len());

    for (i, argument) in arguments.iter().enumerate() {
        let mut parameter = if is_identifier(argument) {
            match find_variable(variables, argument) {
                Some(variable) => AlVariable {
                    name: variable.name.clone(),
                    type_text: variable.type_text.clone(),
                    by_ref: variable.is_record(),
                },
                None => AlVariable::new(clean_name(argument), "Variant"),
            }
        } else {
            AlVariable::new(format!("arg{}", i + 1), literal_type(argument))
        };

        parameter.name = unique_name(&parameter.name, &parameters);
        parameters.push(parameter);
    }

    parameters
}

fn infer_return_type(call: &ProcedureCallSite, variables: &[AlVariable]) -> Option<String> {
    if let Some(target) = &call.assignment_target {
        return find_variable(variables, target).map(|v| v.type_text.clone());
    }
    if call.boolean_context {
        return Some("Boolean".to_string());
    }
    None
}

/// A bare or quoted identifier, nothing else
fn is_identifier(text: &str) -> bool {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return !inner.is_empty() && !inner.contains('"');
    }
    !text.is_empty()
        && !text.starts_with(|c: char| c.is_ascii_digit())
        && text.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !text.eq_ignore_ascii_case("true")
        && !text.eq_ignore_ascii_case("false")
}

/// Type of a literal argument; `Variant` for any other expression
fn literal_type(text: &str) -> &'static str {
    let text = text.trim();
    let digits = text.strip_prefix('-').unwrap_or(text);

    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        "Text"
    } else if text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") {
        "Boolean"
    } else if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        "Integer"
    } else if digits.contains('.')
        && digits.split('.').count() == 2
        && digits
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
    {
        "Decimal"
    } else {
        "Variant"
    }
}

fn unique_name(name: &str, taken: &[AlVariable]) -> String {
    let is_taken = |candidate: &str| taken.iter().any(|p| p.name.eq_ignore_ascii_case(candidate));
    if !is_taken(name) {
        return name.to_string();
    }
    (2..)
        .map(|n| format!("{}{}", name, n))
        .find(|candidate| !is_taken(candidate))
        .unwrap_or_else(|| name.to_string())
}

/// Shapes a [`MissingProcedure`] into one kind of generated procedure
pub trait ProcedureCreator {
    fn missing(&self) -> &MissingProcedure;

    fn kind(&self) -> ProcedureKind;

    fn name(&self) -> String {
        self.missing().call.name.clone()
    }

    fn parameters(&self) -> Vec<AlVariable> {
        self.missing().parameters.clone()
    }

    fn return_type(&self) -> Option<String> {
        self.missing().return_type.clone()
    }

    fn access_modifier(&self) -> AccessModifier {
        if self.missing().same_object {
            AccessModifier::Local
        } else {
            AccessModifier::Public
        }
    }
}

/// Plain procedure with the inferred signature
pub struct CreateMethod<'a>(pub &'a MissingProcedure);

impl ProcedureCreator for CreateMethod<'_> {
    fn missing(&self) -> &MissingProcedure {
        self.0
    }

    fn kind(&self) -> ProcedureKind {
        ProcedureKind::Method
    }
}

/// `[IntegrationEvent]` publisher; publishers return nothing
pub struct CreateIntegrationEvent<'a>(pub &'a MissingProcedure);

impl ProcedureCreator for CreateIntegrationEvent<'_> {
    fn missing(&self) -> &MissingProcedure {
        self.0
    }

    fn kind(&self) -> ProcedureKind {
        ProcedureKind::IntegrationEvent
    }

    fn return_type(&self) -> Option<String> {
        None
    }
}

/// `[BusinessEvent]` publisher; publishers return nothing
pub struct CreateBusinessEvent<'a>(pub &'a MissingProcedure);

impl ProcedureCreator for CreateBusinessEvent<'_> {
    fn missing(&self) -> &MissingProcedure {
        self.0
    }

    fn kind(&self) -> ProcedureKind {
        ProcedureKind::BusinessEvent
    }

    fn return_type(&self) -> Option<String> {
        None
    }
}

pub fn create_procedure(creator: &dyn ProcedureCreator) -> AlProcedure {
    AlProcedure {
        name: creator.name(),
        parameters: creator.parameters(),
        return_type: creator.return_type(),
        access: creator.access_modifier(),
        kind: creator.kind(),
        object: creator.missing().target.clone(),
    }
}
