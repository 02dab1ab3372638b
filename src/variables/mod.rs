//! Placeholder handling: positional `?` parameters and named `$[...]` script
//! variables.
crate::reexport!(params);
crate::reexport!(pool);
