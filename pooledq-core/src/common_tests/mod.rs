//! Reusable test bodies, driven from `tests/` with rstest cases.
