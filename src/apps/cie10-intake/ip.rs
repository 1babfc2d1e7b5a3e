// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::types::GatewayEvent;

/// Address recorded when the event carries no usable client address.
pub const UNKNOWN_CLIENT_IP: &str = "unknown";

/// Resolve the originating client address of a gateway event.
///
/// Gateway-native fields come first since callers cannot forge them. Forwarded
/// headers are only consulted when the gateway supplied nothing, and their values
/// are taken as-is.
pub fn resolve_client_ip(event: &GatewayEvent) -> String {
    let context = event.request_context.as_ref();

    let http_source = context
        .and_then(|ctx| ctx.http.as_ref())
        .and_then(|http| non_empty(http.source_ip.as_deref()));
    let identity_source = context
        .and_then(|ctx| ctx.identity.as_ref())
        .and_then(|identity| non_empty(identity.source_ip.as_deref()));
    let forwarded_for = event
        .header("x-forwarded-for")
        .and_then(|value| non_empty(value.split(',').next()));
    let real_ip = non_empty(event.header("x-real-ip"));

    http_source
        .or(identity_source)
        .or(forwarded_for)
        .or(real_ip)
        .unwrap_or(UNKNOWN_CLIENT_IP)
        .to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
