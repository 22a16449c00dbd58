use super::*;
use crate::fixtures::collector;
use crate::model::{Comparator, Direction, Protocol, Statistic, Volume};

const COLLECTOR: &str = r#"
topology "storm-collector" {
    regions "eu-west-1a" "eu-west-1b" "eu-west-1c"

    load-balancer "StormTestCollector" {
        listener external=80 internal=80 protocol="tcp"
        listener external=443 internal=443 protocol="tcp"
        health-check target-port=80 interval=30 healthy=3 unhealthy=5 timeout=2
    }

    launch-template "ctLaunchConfig" {
        image "ami-93b087e7"
        instance-type "t1.micro"
        credential "default-TVT-ec2key"
        security-groups "StormTest-Collector-WebApp"
        volume "/dev/sdc" kind="ephemeral"
        volume "/dev/sdh" kind="persistent" size=100
    }

    scaling-group "ctScalingGroup" {
        capacity min=2 max=6 desired=2
        cooldown 300
        launch-template "ctLaunchConfig"
        load-balancers "StormTestCollector"
        zones "eu-west-1a" "eu-west-1b" "eu-west-1c"
    }

    policy "ctScaleUp" direction="up" delta=2 cooldown=180
    policy "ctScaleDown" direction="down" delta=-1 cooldown=180

    alarm "ctScaleAlarm-HighCPU" {
        metric "CPUUtilization" namespace="AWS/EC2"
        statistic "average"
        when ">" 70
        period 60
        evaluation-periods 2
        policy "ctScaleUp"
        dimension "AutoScalingGroupName" "ctScalingGroup"
    }

    alarm "ctScaleAlarm-LowCPU" {
        metric "CPUUtilization" namespace="AWS/EC2"
        statistic "average"
        when "<=" 30
        period 60
        evaluation-periods 2
        policy "ctScaleDown"
        dimension "AutoScalingGroupName" "ctScalingGroup"
    }
}
"#;

#[test]
fn test_parse_full_topology() {
    let topology = parse_topology_str(COLLECTOR).unwrap();
    assert_eq!(topology, collector());
    assert!(topology.validate().is_ok());
}

#[test]
fn test_parse_minimal_topology_defaults() {
    let kdl = r#"
        topology "web" {
            regions "eu-west-1a" "eu-west-1b"
            load-balancer "web-lb" {
                listener 80
            }
            launch-template "web-lt" {
                image "ami-1"
                instance-type "t3.micro"
            }
            scaling-group "web-sg" {
                capacity min=1 max=3
            }
            policy "grow" delta=1
            policy "shrink" delta=-1
            alarm "busy" {
                metric "CPUUtilization"
                when "gt" 80
                policy "grow"
            }
        }
    "#;

    let topology = parse_topology_str(kdl).unwrap();

    let listener = &topology.load_balancer.listeners[0];
    assert_eq!(listener.external_port, 80);
    assert_eq!(listener.internal_port, 80);
    assert_eq!(listener.protocol, Protocol::Tcp);
    assert_eq!(topology.load_balancer.health_check.interval_seconds, 30);

    let group = &topology.scaling_group;
    assert_eq!(group.desired_capacity, 1);
    assert_eq!(group.cooldown_seconds, 300);
    assert_eq!(group.launch_template_ref, "web-lt");
    assert!(group.load_balancer_refs.contains("web-lb"));
    assert_eq!(group.zones, topology.regions);

    assert_eq!(topology.policies[0].direction, Direction::Up);
    assert_eq!(topology.policies[1].direction, Direction::Down);

    let alarm = &topology.alarms[0];
    assert_eq!(alarm.comparator, Comparator::Gt);
    assert_eq!(alarm.statistic, Statistic::Average);
    assert_eq!(
        alarm.dimensions.get("AutoScalingGroupName"),
        Some(&"web-sg".to_string())
    );

    assert!(topology.validate().is_ok());
}

#[test]
fn test_parse_positional_listener_ports() {
    let kdl = r#"
        topology "t" {
            regions "z1"
            load-balancer "lb" {
                listener 8080 3000 protocol="http"
            }
            launch-template "lt" {
                image "ami-1"
                instance-type "t3.micro"
            }
            scaling-group "sg" {
                min 1
                max 2
                desired 2
            }
        }
    "#;

    let topology = parse_topology_str(kdl).unwrap();
    let listener = &topology.load_balancer.listeners[0];
    assert_eq!(listener.external_port, 8080);
    assert_eq!(listener.internal_port, 3000);
    assert_eq!(listener.protocol, Protocol::Http);
    assert_eq!(topology.scaling_group.desired_capacity, 2);
}

#[test]
fn test_parse_capacity_keeps_earlier_sizes() {
    let kdl = r#"
        topology "t" {
            regions "z1"
            load-balancer "lb" { listener 80; }
            launch-template "lt" {
                image "ami-1"
                instance-type "t3.micro"
            }
            scaling-group "sg" {
                desired 4
                capacity min=2 max=6
            }
        }
    "#;

    let group = parse_topology_str(kdl).unwrap().scaling_group;
    assert_eq!(group.min_size, 2);
    assert_eq!(group.max_size, 6);
    assert_eq!(group.desired_capacity, 4);

    let reordered = kdl.replace(
        "desired 4\n                capacity min=2 max=6",
        "capacity min=2 max=6\n                desired 4",
    );
    assert_ne!(reordered, kdl);
    assert_eq!(parse_topology_str(&reordered).unwrap().scaling_group, group);
}

#[test]
fn test_parse_volume_size_implies_persistent() {
    let kdl = r#"
        topology "t" {
            regions "z1"
            load-balancer "lb" { listener 80; }
            launch-template "lt" {
                image "ami-1"
                instance-type "t3.micro"
                volume "/dev/sdh" size=50
                volume "/dev/sdc"
            }
            scaling-group "sg" { capacity min=1 max=1; }
        }
    "#;

    let topology = parse_topology_str(kdl).unwrap();
    assert_eq!(
        topology.launch_template.volumes,
        vec![Volume::persistent("/dev/sdh", 50), Volume::ephemeral("/dev/sdc")]
    );
}

#[test]
fn test_parse_collects_every_shape_error() {
    let kdl = r#"
        topology "broken" {
            regions "z1"
            load-balancer "lb" {
                listener external=80 protocol="udp"
                sticky-sessions
            }
            launch-template "lt" {
                image "ami-1"
                volume "/dev/sdh" kind="persistent"
            }
            scaling-group "sg" {
                capacity min=1 max=2
            }
            policy "p" direction="sideways" delta=1
        }
    "#;

    let errors = parse_topology_str(kdl).unwrap_err();
    let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"topology[broken].loadBalancer.listeners[0].protocol"));
    assert!(fields.contains(&"topology[broken].loadBalancer.sticky-sessions"));
    assert!(fields.contains(&"topology[broken].launchTemplate.volumes[0].sizeGiB"));
    assert!(fields.contains(&"topology[broken].policies[0].direction"));
    assert_eq!(errors.len(), 4);
}

#[test]
fn test_parse_missing_blocks() {
    let kdl = r#"
        topology "empty" {
            regions "z1"
        }
    "#;

    let errors = parse_topology_str(kdl).unwrap_err();
    assert!(errors.contains_field("topology[empty].loadBalancer"));
}

#[test]
fn test_parse_syntax_error_is_validation_error() {
    let errors = parse_topology_str("topology \"x\" {").unwrap_err();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.errors()[0].field, "document");
}

#[test]
fn test_parse_empty_document() {
    let errors = parse_topology_str("// nothing here").unwrap_err();
    assert!(errors.contains_field("document"));
}

#[test]
fn test_parse_multiple_topologies() {
    let second = COLLECTOR.replace("storm-collector", "storm-ingest");
    let doc = format!("{}\n{}", COLLECTOR, second);

    let topologies = parse_topologies_str(&doc).unwrap();
    assert_eq!(topologies.len(), 2);
    assert_eq!(topologies[0].name, "storm-collector");
    assert_eq!(topologies[1].name, "storm-ingest");

    // a single-topology parse refuses the same document
    assert!(parse_topology_str(&doc).is_err());
}

#[test]
fn test_parse_duplicate_topology_names() {
    let doc = format!("{}\n{}", COLLECTOR, COLLECTOR);
    let errors = parse_topologies_str(&doc).unwrap_err();
    assert!(errors.contains_field("topology[storm-collector]"));
}

#[test]
fn test_parse_unknown_top_level_node() {
    let doc = format!("{}\nservice \"web\"", COLLECTOR);
    let errors = parse_topologies_str(&doc).unwrap_err();
    assert!(errors.contains_field("service"));
}
