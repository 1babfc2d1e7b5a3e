// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::IntakeError;

/// Handler selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SubmitTexto,
    SelectCode,
}

/// Every route the service answers, keyed by (method, path).
pub const ROUTES: &[(&str, &str, Route)] = &[
    ("POST", "/texto", Route::SubmitTexto),
    ("POST", "/select", Route::SelectCode),
];

/// Look up the handler for `method` and `path`. Does not look at the body.
pub fn resolve_route(method: &str, path: &str) -> Result<Route, IntakeError> {
    ROUTES
        .iter()
        .find(|(m, p, _)| m.eq_ignore_ascii_case(method) && *p == path)
        .map(|(_, _, route)| *route)
        .ok_or_else(|| IntakeError::RouteNotFound {
            method: method.to_string(),
            path: path.to_string(),
        })
}
