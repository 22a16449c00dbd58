//! alarm node parsing

use super::{Issues, as_f64, first_u32, name_arg, positional, prop, string_args, string_prop};
use crate::model::{AlarmSpec, Comparator, Statistic};
use kdl::KdlNode;
use std::collections::BTreeMap;

const DEFAULT_NAMESPACE: &str = "AWS/EC2";
const DEFAULT_PERIOD: u32 = 60;
const DEFAULT_EVALUATION_PERIODS: u32 = 2;

/// Parse an `alarm` node
pub(crate) fn parse_alarm(node: &KdlNode, field: &str, issues: &mut Issues) -> Option<AlarmSpec> {
    let Some(name) = name_arg(node) else {
        issues.push(format!("{}.name", field), "alarm requires a name");
        return None;
    };

    let mut metric_name = None;
    let mut metric_namespace = DEFAULT_NAMESPACE.to_string();
    let mut statistic = Statistic::Average;
    let mut comparator = None;
    let mut threshold = None;
    let mut period_seconds = DEFAULT_PERIOD;
    let mut evaluation_periods = DEFAULT_EVALUATION_PERIODS;
    let mut bound_policy = None;
    let mut dimensions = BTreeMap::new();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "metric" => {
                    metric_name = name_arg(child);
                    if let Some(namespace) = string_prop(child, "namespace") {
                        metric_namespace = namespace;
                    }
                }
                "namespace" => {
                    metric_namespace = name_arg(child).unwrap_or_default();
                }
                "statistic" => {
                    let raw = name_arg(child).unwrap_or_default();
                    match Statistic::parse(&raw) {
                        Some(s) => statistic = s,
                        None => issues.push(
                            format!("{}.statistic", field),
                            format!("unknown statistic '{}' (expected average, sum, min or max)", raw),
                        ),
                    }
                }
                // `when ">" 70`
                "when" => {
                    let mut args = positional(child);
                    let op = args.next().and_then(|v| v.as_string()).unwrap_or_default();
                    comparator = parse_comparator(op, field, issues);
                    threshold = args.next().and_then(as_f64);
                    if threshold.is_none() {
                        issues.push(format!("{}.threshold", field), "expected a number");
                    }
                }
                "comparator" | "comparison" => {
                    let op = name_arg(child).unwrap_or_default();
                    comparator = parse_comparator(&op, field, issues);
                }
                "threshold" => {
                    threshold = positional(child).next().and_then(as_f64);
                    if threshold.is_none() {
                        issues.push(format!("{}.threshold", field), "expected a number");
                    }
                }
                "period" => {
                    if let Some(v) = first_u32(child, &format!("{}.periodSeconds", field), issues) {
                        period_seconds = v;
                    }
                }
                "evaluation-periods" | "evaluation_periods" => {
                    if let Some(v) =
                        first_u32(child, &format!("{}.evaluationPeriods", field), issues)
                    {
                        evaluation_periods = v;
                    }
                }
                "policy" => {
                    bound_policy = name_arg(child);
                }
                // `dimension "AutoScalingGroupName" "ctScalingGroup"`
                "dimension" => {
                    let args = string_args(child);
                    match args.as_slice() {
                        [key, value] => {
                            dimensions.insert(key.clone(), value.clone());
                        }
                        _ => issues.push(
                            format!("{}.dimensions", field),
                            "dimension takes a key and a value",
                        ),
                    }
                }
                other => issues.push(
                    format!("{}.{}", field, other),
                    format!("unknown node '{}'", other),
                ),
            }
        }
    }

    let mut complete = true;
    if metric_name.is_none() {
        issues.push(format!("{}.metricName", field), "alarm requires a metric");
        complete = false;
    }
    if comparator.is_none() || threshold.is_none() {
        issues.push(
            format!("{}.threshold", field),
            "alarm requires a condition (e.g. `when \">\" 70`)",
        );
        complete = false;
    }
    if bound_policy.is_none() {
        issues.push(format!("{}.boundPolicy", field), "alarm requires a policy");
        complete = false;
    }
    if !complete {
        return None;
    }

    Some(AlarmSpec {
        name,
        metric_namespace,
        metric_name: metric_name?,
        statistic,
        comparator: comparator?,
        threshold: threshold?,
        period_seconds,
        evaluation_periods,
        bound_policy: bound_policy?,
        dimensions,
    })
}

fn parse_comparator(raw: &str, field: &str, issues: &mut Issues) -> Option<Comparator> {
    let parsed = Comparator::parse(raw);
    if parsed.is_none() {
        issues.push(
            format!("{}.comparator", field),
            format!("unsupported comparator '{}' (expected gt, gte, lt or lte)", raw),
        );
    }
    parsed
}
