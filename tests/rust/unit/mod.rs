//! Unit tests - public API of the self-contained building blocks
