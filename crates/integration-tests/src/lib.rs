//! End-to-end tests for echohub live under `tests/`; this library is empty.
