//! Shared test fixtures and fake capabilities.

#![allow(dead_code)]
