crate::reexport!(alias);
crate::reexport!(clause);
crate::reexport!(position);
crate::reexport!(verb);
