// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Input providers.
//!
//! Two implementations of the `get_input` contract: the user provider
//! waits on UI signals; the controller provider resumes the controller
//! agent and parses its output for an action.

pub mod controller;
pub mod user;
