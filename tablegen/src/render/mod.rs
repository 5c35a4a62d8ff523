//! Emission of a [`CompiledTable`] as source code.
//!
//! Each artifact is an [`AsModule`] that writes its whole text into a
//! [`Module`]. Rendering only reads the compiled table, so rendering the same
//! table twice yields byte-identical modules.

use serde::{Deserialize, Serialize};
use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::table::CompiledTable;

pub mod cpp;
pub mod rust;

/// A rendered source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Suggested file name, used when no explicit output path is given.
    pub name: String,
    pub contents: Vec<u8>,
}

/// Trait for artifacts that can be rendered to a [`Module`].
// `Into<Module>` would not allow boxing artifacts of different targets.
pub trait AsModule {
    fn as_module(&self) -> std::io::Result<Module>;
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to format {artifact}: {source}")]
    Io {
        artifact: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("the {target} target has no {artifact} artifact")]
    Unsupported {
        target: &'static str,
        artifact: &'static str,
    },
}

/// Language the tables are rendered in.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Cpp,
    Rust,
}

/// Shape of the rendered dispatch code. Both policies are driven by the same
/// compiled table.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, EnumIter, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DispatchPolicy {
    /// A `switch` over the opcode, then over `(mask, match)`.
    #[default]
    Switch,
    /// A 128-entry mask array plus a hash map keyed by `(mask, match)`.
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Artifact {
    Identifiers,
    Decoder,
    Executor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub target: Target,
    pub dispatch: DispatchPolicy,
    /// Enclosing C++ namespace.
    pub namespace: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            target: Target::default(),
            dispatch: DispatchPolicy::default(),
            namespace: String::from("yarvs"),
        }
    }
}

pub fn indent(level: usize) -> String {
    "    ".repeat(level)
}

/// Renders one artifact of `table`.
#[tracing::instrument(skip(table, options), fields(target = ?options.target))]
pub fn render(
    table: &CompiledTable,
    artifact: Artifact,
    options: &RenderOptions,
) -> Result<Module, RenderError> {
    let artifact_name: &'static str = artifact.into();
    let renderer: Box<dyn AsModule + '_> = match (options.target, artifact) {
        (Target::Cpp, Artifact::Identifiers) => {
            Box::new(cpp::IdentifiersHeader::new(table, &options.namespace))
        }
        (Target::Cpp, Artifact::Decoder) => Box::new(cpp::DecoderSource::new(
            table,
            &options.namespace,
            options.dispatch,
        )),
        (Target::Cpp, Artifact::Executor) => {
            Box::new(cpp::ExecutorTable::new(table, &options.namespace))
        }
        (Target::Rust, Artifact::Identifiers) => Box::new(rust::IdentifiersModule::new(table)),
        (Target::Rust, Artifact::Decoder) => Box::new(rust::DecoderModule::new(table)),
        (Target::Rust, Artifact::Executor) => {
            return Err(RenderError::Unsupported {
                target: options.target.into(),
                artifact: artifact_name,
            })
        }
    };
    let module = renderer.as_module().map_err(|source| RenderError::Io {
        artifact: artifact_name,
        source,
    })?;
    tracing::debug!(
        module = %module.name,
        bytes = module.contents.len(),
        "rendered {artifact_name}"
    );
    Ok(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::compiled;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn rendering_is_deterministic() {
        let (a, b) = (compiled(), compiled());
        for target in Target::iter() {
            for dispatch in DispatchPolicy::iter() {
                let options = RenderOptions {
                    target,
                    dispatch,
                    ..Default::default()
                };
                for artifact in Artifact::iter() {
                    let first = render(&a, artifact, &options);
                    let second = render(&b, artifact, &options);
                    match (first, second) {
                        (Ok(first), Ok(second)) => assert_eq!(first, second),
                        (Err(_), Err(_)) => {}
                        _ => panic!("{target:?}/{artifact:?} rendered only once"),
                    }
                }
            }
        }
    }

    #[test]
    fn rust_target_has_no_executor() {
        let options = RenderOptions {
            target: Target::Rust,
            ..Default::default()
        };
        let err = render(&compiled(), Artifact::Executor, &options).unwrap_err();
        assert!(matches!(
            err,
            RenderError::Unsupported {
                target: "rust",
                artifact: "executor"
            }
        ));
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!(Target::from_str("cpp"), Ok(Target::Cpp));
        assert_eq!(Target::from_str("rust"), Ok(Target::Rust));
        assert_eq!(DispatchPolicy::from_str("flat"), Ok(DispatchPolicy::Flat));
        assert!(DispatchPolicy::from_str("jump-table").is_err());
    }

    #[test]
    fn indentation() {
        assert_eq!(indent(0), "");
        assert_eq!(indent(2), "        ");
    }
}
