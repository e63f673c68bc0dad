//! Maps `(kind, name)` to the handler file holding its SQL.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::DispatchError;
use crate::event::EventKind;

const HANDLER_EXT: &str = "sql";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerDescriptor {
    pub path: PathBuf,
    pub kind: EventKind,
}

#[derive(Debug, Clone)]
pub struct HandlerResolver {
    root: PathBuf,
}

impl HandlerResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/queries/{name}.sql` or `{root}/events/{name}.sql`.
    ///
    /// Names that would leave the handler tree are refused.
    pub fn resolve(&self, kind: EventKind, name: &str) -> Result<HandlerDescriptor, DispatchError> {
        let mut components = Path::new(name).components();
        let single_normal = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if name.is_empty() || !single_normal || name.contains(['/', '\\']) {
            return Err(DispatchError::InvalidHandlerName(name.to_string()));
        }
        let path = self
            .root
            .join(kind.handler_dir())
            .join(format!("{name}.{HANDLER_EXT}"));
        Ok(HandlerDescriptor { path, kind })
    }
}

impl HandlerDescriptor {
    pub fn read_sql(&self) -> Result<String, DispatchError> {
        fs::read_to_string(&self.path).map_err(|source| DispatchError::HandlerNotFound {
            path: self.path.clone(),
            source,
        })
    }
}
