// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Counter helpers over the `metrics` facade. Without an installed recorder
// every call is a no-op; the CLI installs a Prometheus exporter when
// `observability.metrics_port` is set.

use metrics::counter;

use crate::domain::envelope::Transport;

pub fn record_ingress_message(transport: Transport) {
    counter!("canis_ingress_messages_total", "transport" => transport.as_str()).increment(1);
}

pub fn record_ingress_rejected(status: u16) {
    counter!("canis_ingress_rejected_total", "status" => status.to_string()).increment(1);
}

/// `outcome` is one of `delivered`, `failed`, `no_webhooks`, `decode_error`.
pub fn record_notifier_delivery(outcome: &'static str) {
    counter!("canis_notifier_deliveries_total", "outcome" => outcome).increment(1);
}

pub fn record_scheduler_launch(status: &'static str) {
    counter!("canis_scheduler_launches_total", "status" => status).increment(1);
}

pub fn record_informer_event(kind: &'static str) {
    counter!("canis_informer_events_total", "kind" => kind).increment(1);
}
