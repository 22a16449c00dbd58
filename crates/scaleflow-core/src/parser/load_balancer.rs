//! load-balancer node parsing

use super::{Issues, as_u16, name_arg, positional, prop, string_prop, u32_prop};
use crate::model::{HealthCheck, Listener, LoadBalancerSpec, Protocol};
use kdl::KdlNode;

/// Parse a `load-balancer` node
pub(crate) fn parse_load_balancer(node: &KdlNode, issues: &mut Issues) -> Option<LoadBalancerSpec> {
    let Some(name) = name_arg(node) else {
        issues.push("loadBalancer.name", "load-balancer requires a name");
        return None;
    };

    let mut listeners = Vec::new();
    let mut health_check = HealthCheck::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "listener" => {
                    let field = format!("loadBalancer.listeners[{}]", listeners.len());
                    if let Some(listener) = parse_listener(child, &field, issues) {
                        listeners.push(listener);
                    }
                }
                "health-check" | "health_check" | "healthcheck" => {
                    health_check = parse_health_check(child, issues);
                }
                other => issues.push(
                    format!("loadBalancer.{}", other),
                    format!("unknown node '{}'", other),
                ),
            }
        }
    }

    Some(LoadBalancerSpec {
        name,
        listeners,
        health_check,
    })
}

/// `listener external=80 internal=80 protocol="tcp"` or `listener 80 80`
fn parse_listener(node: &KdlNode, field: &str, issues: &mut Issues) -> Option<Listener> {
    let mut args = positional(node);
    let external = prop(node, "external").or_else(|| args.next());
    let internal = prop(node, "internal").or_else(|| args.next());

    let external_port = match external {
        Some(value) => as_u16(value),
        None => None,
    };
    if external_port.is_none() {
        issues.push(
            format!("{}.externalPort", field),
            "expected a port number between 0 and 65535",
        );
    }

    // the internal port defaults to the external one
    let internal_port = match internal {
        Some(value) => {
            let port = as_u16(value);
            if port.is_none() {
                issues.push(
                    format!("{}.internalPort", field),
                    "expected a port number between 0 and 65535",
                );
            }
            port
        }
        None => external_port,
    };

    let protocol = match string_prop(node, "protocol") {
        Some(raw) => match Protocol::parse(&raw) {
            Some(protocol) => Some(protocol),
            None => {
                issues.push(
                    format!("{}.protocol", field),
                    format!("unsupported protocol '{}' (expected tcp or http)", raw),
                );
                None
            }
        },
        None => Some(Protocol::default()),
    };

    Some(Listener::new(external_port?, internal_port?, protocol?))
}

/// `health-check target-port=80 interval=30 healthy=3 unhealthy=5 timeout=2`
fn parse_health_check(node: &KdlNode, issues: &mut Issues) -> HealthCheck {
    const FIELD: &str = "loadBalancer.healthCheck";
    let mut check = HealthCheck::default();

    if let Some(value) = prop(node, "target-port").or_else(|| prop(node, "port")) {
        match as_u16(value) {
            Some(port) => check.target_port = port,
            None => issues.push(
                format!("{}.targetPort", FIELD),
                "expected a port number between 0 and 65535",
            ),
        }
    }
    if let Some(v) = u32_prop(node, "interval", &format!("{}.intervalSeconds", FIELD), issues) {
        check.interval_seconds = v;
    }
    if let Some(v) = u32_prop(node, "healthy", &format!("{}.healthyThreshold", FIELD), issues) {
        check.healthy_threshold = v;
    }
    if let Some(v) = u32_prop(
        node,
        "unhealthy",
        &format!("{}.unhealthyThreshold", FIELD),
        issues,
    ) {
        check.unhealthy_threshold = v;
    }
    if let Some(v) = u32_prop(node, "timeout", &format!("{}.timeoutSeconds", FIELD), issues) {
        check.timeout_seconds = v;
    }

    check
}
