// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Library surface of the `strata` binary, exposed so commands can be tested.

pub mod commands;
