//! Dropping entry point outputs nothing downstream reads.
//!
//! The source itself is left alone. A wrapper entry point named
//! `<entry>__OPTIMIZED` is appended: it calls the original entry and
//! returns only the outputs whose semantics are still wanted, so the
//! optimizer can remove the work feeding the others.
//!
//! ```text
//! struct VSOut__OPTIMIZED
//! {
//! 	float4 Position : SV_POSITION;
//! 	float2 UV0 : TEXCOORD0;
//! };
//!
//! // Removed Outputs: TEXCOORD1
//! VSOut__OPTIMIZED MainVS__OPTIMIZED(float4 InPosition : ATTRIBUTE0)
//! {
//! 	VSOut __original = MainVS(InPosition);
//! 	VSOut__OPTIMIZED __result;
//! 	__result.Position = __original.Position;
//! 	__result.UV0 = __original.UV0;
//! 	return __result;
//! }
//! ```

use hlslcc_diagnostic::SourceError;
use hlslcc_syntax::ast::{
    DeclaratorList, FullySpecifiedType, FunctionPrototype, Parameter, StructSpecifier,
    TranslationUnit, TypeName, TypeQualifier,
};
use hlslcc_syntax::NameTable;

const SUFFIX: &str = "__OPTIMIZED";

#[derive(Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum OutputsError {
    #[error("{0}")]
    Parse(#[from] SourceError),
    #[error("entry point '{0}' not found")]
    EntryNotFound(String),
    #[error("outputs of '{entry}' cannot be rewritten: {reason}")]
    Unsupported { entry: String, reason: String },
}

/// Source with the wrapper entry point appended.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct StrippedOutputs {
    pub source: String,
    pub entry_point: String,
    /// Semantics no longer written, in declaration order.
    pub removed: Vec<String>,
}

/// Append a wrapper around `entry_point` that writes only the outputs
/// named in `system_outputs` or `used_outputs` (compared ignoring case).
/// `None` when every output is still used.
pub fn remove_unused_outputs(
    source: &str,
    system_outputs: &[&str],
    used_outputs: &[&str],
    entry_point: &str,
) -> Result<Option<StrippedOutputs>, OutputsError> {
    let stream = hlslcc_lexer::lex(source, "<outputs>");
    let unit = hlslcc_parse::parse(&stream)?;
    let function = unit
        .find_function(entry_point)
        .ok_or_else(|| OutputsError::EntryNotFound(entry_point.to_owned()))?;

    let wanted = |semantic: &str| {
        system_outputs
            .iter()
            .chain(used_outputs)
            .any(|s| s.eq_ignore_ascii_case(semantic))
    };
    let wrapper = Wrapper {
        unit: &unit,
        names: &unit.names,
        proto: &function.prototype,
        entry: entry_point,
    };
    let Some((text, removed)) = wrapper.build(&wanted)? else {
        tracing::debug!(entry = entry_point, "every output is used");
        return Ok(None);
    };
    tracing::debug!(entry = entry_point, removed = ?removed, "removed unused outputs");

    let mut stripped = source.to_owned();
    if !stripped.ends_with('\n') {
        stripped.push('\n');
    }
    stripped.push('\n');
    stripped.push_str(&text);
    Ok(Some(StrippedOutputs {
        source: stripped,
        entry_point: format!("{entry_point}{SUFFIX}"),
        removed,
    }))
}

/// How the entry point returns its outputs.
enum Returned<'u> {
    Nothing,
    /// A single value with the prototype's semantic.
    Value { ty: String, semantic: String },
    Struct(&'u StructSpecifier),
}

struct Wrapper<'u> {
    unit: &'u TranslationUnit,
    names: &'u NameTable,
    proto: &'u FunctionPrototype,
    entry: &'u str,
}

impl<'u> Wrapper<'u> {
    fn unsupported(&self, reason: impl Into<String>) -> OutputsError {
        OutputsError::Unsupported {
            entry: self.entry.to_owned(),
            reason: reason.into(),
        }
    }

    fn returned(&self) -> Result<Returned<'u>, OutputsError> {
        let specifier = &self.proto.return_type.specifier;
        let structure = match &specifier.name {
            TypeName::Void => return Ok(Returned::Nothing),
            TypeName::Named(name) => self.unit.find_struct(self.names.resolve(*name)),
            TypeName::Struct(spec) => Some(&**spec),
            _ => None,
        };
        if let Some(structure) = structure {
            return Ok(Returned::Struct(structure));
        }
        let semantic = self
            .proto
            .return_semantic
            .ok_or_else(|| self.unsupported("return value without a semantic"))?;
        Ok(Returned::Value {
            ty: specifier.to_hlsl(self.names),
            semantic: self.names.resolve(semantic).to_owned(),
        })
    }

    /// Wrapper source and removed semantics, or `None` when nothing goes.
    fn build(&self, wanted: &dyn Fn(&str) -> bool) -> Result<Option<(String, Vec<String>)>, OutputsError> {
        if !self.proto.attributes.is_empty() {
            return Err(self.unsupported("entry point attributes"));
        }
        let mut removed = Vec::new();

        // ── Parameters ──
        let mut params = Vec::new();
        let mut locals = Vec::new();
        let mut args = Vec::new();
        for param in &self.proto.parameters {
            let declaration = &param.declaration;
            if !declaration.array_dims.is_empty() {
                return Err(self.unsupported("array parameter"));
            }
            let name = self.names.resolve(declaration.identifier);
            args.push(name.to_owned());
            let is_output = param.ty.qualifier.contains(TypeQualifier::OUT)
                && !param.ty.qualifier.contains(TypeQualifier::IN);
            let semantic = declaration.semantic.map(|s| self.names.resolve(s));
            match (is_output, semantic) {
                (true, None) => return Err(self.unsupported(format!("output '{name}' without a semantic"))),
                (true, Some(semantic)) if !wanted(semantic) => {
                    removed.push(semantic.to_owned());
                    locals.push(format!("{} {name};", param.ty.specifier.to_hlsl(self.names)));
                }
                _ => params.push(self.parameter(param)),
            }
        }

        // ── Return value ──
        let call = format!("{}({})", self.entry, args.join(", "));
        let mut text = String::new();
        let mut body = locals;
        let signature_type;
        let mut return_semantic = String::new();
        match self.returned()? {
            Returned::Nothing => {
                signature_type = "void".to_owned();
                body.push(format!("{call};"));
            }
            Returned::Value { ty, semantic } => {
                if wanted(&semantic) {
                    signature_type = ty;
                    return_semantic = format!(" : {semantic}");
                    body.push(format!("return {call};"));
                } else {
                    removed.push(semantic);
                    signature_type = "void".to_owned();
                    body.push(format!("{call};"));
                }
            }
            Returned::Struct(structure) => {
                let original = structure
                    .name
                    .map(|n| self.names.resolve(n).to_owned())
                    .ok_or_else(|| self.unsupported("anonymous output struct"))?;
                let mut kept = Vec::new();
                let mut members = String::new();
                for list in &structure.members {
                    for declaration in &list.declarations {
                        let name = self.names.resolve(declaration.identifier);
                        if !declaration.array_dims.is_empty() {
                            return Err(self.unsupported(format!("array output '{name}'")));
                        }
                        if matches!(list.ty.specifier.name, TypeName::Named(_) | TypeName::Struct(_)) {
                            return Err(self.unsupported(format!("nested struct output '{name}'")));
                        }
                        let semantic = declaration
                            .semantic
                            .map(|s| self.names.resolve(s))
                            .ok_or_else(|| self.unsupported(format!("output '{name}' without a semantic")))?;
                        if wanted(semantic) {
                            members.push_str(&format!("\t{}{name} : {semantic};\n", self.member_type(list)));
                            kept.push(name);
                        } else {
                            removed.push(semantic.to_owned());
                        }
                    }
                }
                if kept.is_empty() {
                    signature_type = "void".to_owned();
                    body.push(format!("{call};"));
                } else {
                    let optimized = format!("{original}{SUFFIX}");
                    text.push_str(&format!("struct {optimized}\n{{\n{members}}};\n\n"));
                    body.push(format!("{original} __original = {call};"));
                    body.push(format!("{optimized} __result;"));
                    for name in kept {
                        body.push(format!("__result.{name} = __original.{name};"));
                    }
                    body.push("return __result;".to_owned());
                    signature_type = optimized;
                }
            }
        }

        if removed.is_empty() {
            return Ok(None);
        }
        text.push_str(&format!("// Removed Outputs: {}\n", removed.join(", ")));
        text.push_str(&format!(
            "{signature_type} {}{SUFFIX}({}){return_semantic}\n",
            self.entry,
            params.join(", ")
        ));
        text.push_str("{\n");
        for line in body {
            text.push('\t');
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str("}\n");
        Ok(Some((text, removed)))
    }

    /// `nointerpolation float4 ` and the like, ready for a member name.
    fn member_type(&self, list: &DeclaratorList) -> String {
        format!(
            "{}{} ",
            interpolation(list.ty.qualifier),
            list.ty.specifier.to_hlsl(self.names)
        )
    }

    /// A parameter as declared, qualifiers and semantic included.
    fn parameter(&self, param: &Parameter) -> String {
        let declaration = &param.declaration;
        let mut text = qualified(&param.ty, self.names);
        text.push(' ');
        text.push_str(self.names.resolve(declaration.identifier));
        if let Some(semantic) = declaration.semantic {
            text.push_str(" : ");
            text.push_str(self.names.resolve(semantic));
        }
        text
    }
}

fn interpolation(qualifier: TypeQualifier) -> String {
    const WORDS: [(TypeQualifier, &str); 5] = [
        (TypeQualifier::NO_INTERPOLATION, "nointerpolation "),
        (TypeQualifier::LINEAR, "linear "),
        (TypeQualifier::CENTROID, "centroid "),
        (TypeQualifier::NO_PERSPECTIVE, "noperspective "),
        (TypeQualifier::SAMPLE, "sample "),
    ];
    WORDS
        .iter()
        .filter(|(q, _)| qualifier.contains(*q))
        .map(|(_, word)| *word)
        .collect()
}

fn qualified(ty: &FullySpecifiedType, names: &NameTable) -> String {
    let q = ty.qualifier;
    let direction = if q.contains(TypeQualifier::INOUT) {
        "inout "
    } else if q.contains(TypeQualifier::OUT) {
        "out "
    } else if q.contains(TypeQualifier::IN) {
        "in "
    } else {
        ""
    };
    let uniform = if q.contains(TypeQualifier::UNIFORM) {
        "uniform "
    } else {
        ""
    };
    format!(
        "{uniform}{direction}{}{}",
        interpolation(q),
        ty.specifier.to_hlsl(names)
    )
}
