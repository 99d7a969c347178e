//! Status flow registry built from the configured operation steps.
//!
//! The registry is an immutable snapshot: it is rebuilt from scratch every
//! time the step source is reloaded and swapped in as a whole. It keeps the
//! display data of every step, including inactive ones, so historical orders
//! sitting in a retired step still render with a proper label.

use super::machine::OrderStatusMachine;
use laundry_types::{FlowStepView, OperationStep, OrderStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static TONE_PATTERN: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^([a-z]+)-\d{2,3}$").expect("tone pattern is valid"));

const MUTED_BACKGROUND: &str = "bg-muted";
const MUTED_TEXT: &str = "text-muted-foreground";

fn tone_family(color: &str) -> Option<&str> {
	let token = color
		.strip_prefix("bg-")
		.or_else(|| color.strip_prefix("text-"))
		.unwrap_or(color);
	TONE_PATTERN
		.captures(token)
		.and_then(|caps| caps.get(1))
		.map(|family| family.as_str())
}

/// Light background class for a `family-shade` color token, e.g.
/// `blue-500` becomes `bg-blue-100`.
pub fn background_tone(color: &str) -> String {
	match tone_family(color) {
		Some(family) => format!("bg-{}-100", family),
		None => MUTED_BACKGROUND.to_string(),
	}
}

/// Dark text class for a `family-shade` color token, e.g. `blue-500`
/// becomes `text-blue-700`.
pub fn text_tone(color: &str) -> String {
	match tone_family(color) {
		Some(family) => format!("text-{}-700", family),
		None => MUTED_TEXT.to_string(),
	}
}

/// Everything needed to render one status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDisplay {
	pub key: OrderStatus,
	pub label: String,
	pub icon: Option<String>,
	pub background_class: String,
	pub text_class: String,
	pub is_active: bool,
	/// False for the fallback display of a key with no configured step.
	pub is_known: bool,
}

impl StepDisplay {
	fn from_step(step: &OperationStep) -> Self {
		Self {
			key: OrderStatus::new(step.key.clone()),
			label: step.name.clone(),
			icon: Some(step.icon.clone()).filter(|icon| !icon.is_empty()),
			background_class: background_tone(&step.color),
			text_class: text_tone(&step.color),
			is_active: step.is_active,
			is_known: true,
		}
	}

	fn unknown(key: &str) -> Self {
		Self {
			key: OrderStatus::new(key),
			label: key.to_string(),
			icon: None,
			background_class: MUTED_BACKGROUND.to_string(),
			text_class: MUTED_TEXT.to_string(),
			is_active: false,
			is_known: false,
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct StatusFlowRegistry {
	/// Configured steps in source order, duplicates removed.
	steps: Vec<OperationStep>,
	displays: HashMap<String, StepDisplay>,
	machine: OrderStatusMachine,
}

impl StatusFlowRegistry {
	/// Builds the registry from the full step list. When a key appears more
	/// than once the first occurrence wins.
	pub fn new(source: Vec<OperationStep>) -> Self {
		let mut steps: Vec<OperationStep> = Vec::with_capacity(source.len());
		let mut displays = HashMap::with_capacity(source.len());

		for step in source {
			if displays.contains_key(&step.key) {
				tracing::warn!(key = %step.key, "Ignoring duplicate operation step");
				continue;
			}
			displays.insert(step.key.clone(), StepDisplay::from_step(&step));
			steps.push(step);
		}

		// Stable sort keeps source order between equal ranks
		let mut active: Vec<&OperationStep> = steps.iter().filter(|s| s.is_active).collect();
		active.sort_by_key(|s| s.order);
		let flow = active
			.into_iter()
			.map(|s| OrderStatus::new(s.key.clone()))
			.collect();

		Self {
			steps,
			displays,
			machine: OrderStatusMachine::new(flow),
		}
	}

	/// Registry with no steps; every status renders as its raw key.
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// Active step keys in rank order.
	pub fn status_flow(&self) -> &[OrderStatus] {
		self.machine.flow()
	}

	pub fn machine(&self) -> &OrderStatusMachine {
		&self.machine
	}

	pub fn steps(&self) -> &[OperationStep] {
		&self.steps
	}

	/// Display data for any key, with a muted fallback for unknown keys.
	pub fn display(&self, key: &str) -> StepDisplay {
		self.displays
			.get(key)
			.cloned()
			.unwrap_or_else(|| StepDisplay::unknown(key))
	}

	pub fn label(&self, key: &str) -> String {
		self.displays
			.get(key)
			.map(|d| d.label.clone())
			.unwrap_or_else(|| key.to_string())
	}

	/// One view per configured step, in source order.
	pub fn step_views(&self) -> Vec<FlowStepView> {
		self.steps
			.iter()
			.map(|step| {
				let display = self.display(&step.key);
				FlowStepView {
					position: self.machine.index(&step.key),
					key: display.key,
					name: display.label,
					icon: display.icon,
					background_class: display.background_class,
					text_class: display.text_class,
					is_active: display.is_active,
				}
			})
			.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn step(key: &str, color: &str, is_active: bool, order: i32) -> OperationStep {
		OperationStep {
			key: key.to_string(),
			name: key.to_uppercase(),
			color: color.to_string(),
			icon: "circle".to_string(),
			is_active,
			order,
		}
	}

	#[test]
	fn test_flow_is_active_steps_by_rank() {
		let registry = StatusFlowRegistry::new(vec![
			step("delivered", "green-500", true, 40),
			step("received", "slate-500", true, 10),
			step("ironing", "amber-400", false, 25),
			step("washing", "blue-500", true, 20),
		]);

		let flow: Vec<_> = registry.status_flow().iter().map(|s| s.as_str()).collect();
		assert_eq!(flow, vec!["received", "washing", "delivered"]);
		assert_eq!(registry.machine().index("washing"), Some(1));
	}

	#[test]
	fn test_equal_ranks_keep_source_order() {
		let registry = StatusFlowRegistry::new(vec![
			step("b", "blue-500", true, 1),
			step("a", "red-500", true, 1),
		]);
		let flow: Vec<_> = registry.status_flow().iter().map(|s| s.as_str()).collect();
		assert_eq!(flow, vec!["b", "a"]);
	}

	#[test]
	fn test_inactive_steps_keep_display() {
		let registry = StatusFlowRegistry::new(vec![step("ironing", "amber-400", false, 3)]);
		let display = registry.display("ironing");
		assert!(display.is_known);
		assert!(!display.is_active);
		assert_eq!(display.label, "IRONING");
		assert_eq!(display.background_class, "bg-amber-100");
		assert_eq!(display.text_class, "text-amber-700");
		assert!(registry.status_flow().is_empty());
	}

	#[test]
	fn test_unknown_key_fallback() {
		let registry = StatusFlowRegistry::empty();
		let display = registry.display("legacy_status");
		assert!(!display.is_known);
		assert_eq!(display.label, "legacy_status");
		assert_eq!(display.icon, None);
		assert_eq!(display.background_class, "bg-muted");
		assert_eq!(display.text_class, "text-muted-foreground");
		assert_eq!(registry.label("legacy_status"), "legacy_status");
	}

	#[test]
	fn test_duplicate_keys_first_wins() {
		let registry = StatusFlowRegistry::new(vec![
			step("washing", "blue-500", true, 1),
			step("washing", "red-500", true, 2),
		]);
		assert_eq!(registry.steps().len(), 1);
		assert_eq!(registry.status_flow().len(), 1);
		assert_eq!(registry.display("washing").background_class, "bg-blue-100");
	}

	#[test]
	fn test_tone_derivation() {
		assert_eq!(background_tone("blue-500"), "bg-blue-100");
		assert_eq!(text_tone("blue-500"), "text-blue-700");
		assert_eq!(background_tone("bg-emerald-600"), "bg-emerald-100");
		assert_eq!(text_tone("text-rose-50"), "text-rose-700");

		for bad in ["", "blue", "#3366ff", "Blue-500", "blue-5", "blue-5000"] {
			assert_eq!(background_tone(bad), "bg-muted");
			assert_eq!(text_tone(bad), "text-muted-foreground");
		}
	}

	#[test]
	fn test_step_views_positions() {
		let registry = StatusFlowRegistry::new(vec![
			step("received", "slate-500", true, 1),
			step("ironing", "amber-400", false, 2),
			step("washing", "blue-500", true, 3),
		]);
		let views = registry.step_views();
		assert_eq!(views.len(), 3);
		assert_eq!(views[0].position, Some(0));
		assert_eq!(views[1].position, None);
		assert_eq!(views[2].position, Some(1));
	}
}
