//! Tests for boundary value types
