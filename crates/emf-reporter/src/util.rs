// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

const MAX_NAMESPACE_LENGTH: usize = 255;
const MAX_LOG_NAME_LENGTH: usize = 512;

/// Parses a CloudWatch metric namespace.
///
/// Returns the trimmed namespace, or `None` when it is empty, longer than 255
/// characters, uses the reserved `AWS/` prefix, or contains characters other
/// than ASCII alphanumerics, spaces and `. - _ / # :`.
pub fn parse_metric_namespace(namespace: &str) -> Option<String> {
    let trimmed = namespace.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.len() > MAX_NAMESPACE_LENGTH {
        tracing::error!(
            "Metric namespace is longer than {MAX_NAMESPACE_LENGTH} characters. Ignoring namespace."
        );
        return None;
    }

    if trimmed.starts_with("AWS/") {
        tracing::error!(
            "Metric namespace '{trimmed}' uses the reserved AWS/ prefix. Ignoring namespace."
        );
        return None;
    }

    if let Some(invalid_char) = trimmed
        .chars()
        .find(|&ch| !ch.is_ascii_alphanumeric() && !" .-_/#:".contains(ch))
    {
        tracing::error!(
            "Metric namespace contains invalid character '{invalid_char}' in '{trimmed}'. Ignoring namespace."
        );
        return None;
    }

    Some(trimmed.to_string())
}

/// Log group names are 1 to 512 characters of ASCII alphanumerics and `. - _ / #`.
pub fn is_valid_log_group_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_LOG_NAME_LENGTH
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ".-_/#".contains(ch))
}

/// Log stream names are 1 to 512 characters and may not contain `:` or `*`.
pub fn is_valid_log_stream_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_LOG_NAME_LENGTH && !name.contains([':', '*'])
}
