use super::{model::Rule, traffic::TrafficEvent};

/// Whether a single rule admits the event, ignoring status and precedence
pub fn rule_admits(rule: &Rule, event: &TrafficEvent) -> bool {
    rule.direction() == event.direction
        && rule.protocol.admits(event.protocol)
        && (rule.protocol.ignores_ports() || rule.port_range.contains(event.port))
        && rule.target.address().contains(event.address)
}

/// Find the highest-precedence active rule admitting the event
///
/// Precedence is the smallest `priority`; equal priorities fall back to the
/// smallest store `sequence`, i.e. the rule added first. `created_at` is not
/// consulted since the wall clock may step backwards between inserts.
pub fn find_match<'a>(rules: &'a [Rule], event: &TrafficEvent) -> Option<&'a Rule> {
    rules
        .iter()
        .filter(|rule| rule.is_active())
        .filter(|rule| rule_admits(rule, event))
        .min_by_key(|rule| (rule.priority, rule.sequence))
}
