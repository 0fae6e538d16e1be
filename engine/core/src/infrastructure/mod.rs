// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod log_sink;
pub mod providers;

pub use log_sink::{FanOutLogSink, InMemoryLogSink, TracingLogSink, TranslationBus};
pub use providers::InMemoryCapabilityProvider;
