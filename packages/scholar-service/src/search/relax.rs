use serde::Serialize;

use scholar_config::Relaxation;
use scholar_domain::FilterExpr;

/// Filter relaxation stages, strictest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxationStage {
	/// The full normalized filter.
	Strict,
	/// Predicates on `core_fields` only.
	CoreConditions,
	/// Predicates on `basic_fields` only.
	Basic,
	/// Predicates on `subject_fields` only.
	SubjectOnly,
	/// No filter.
	Unfiltered,
}
impl RelaxationStage {
	pub const ALL: [Self; 5] =
		[Self::Strict, Self::CoreConditions, Self::Basic, Self::SubjectOnly, Self::Unfiltered];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Strict => "strict",
			Self::CoreConditions => "core_conditions",
			Self::Basic => "basic",
			Self::SubjectOnly => "subject_only",
			Self::Unfiltered => "unfiltered",
		}
	}

	pub fn next(self) -> Option<Self> {
		match self {
			Self::Strict => Some(Self::CoreConditions),
			Self::CoreConditions => Some(Self::Basic),
			Self::Basic => Some(Self::SubjectOnly),
			Self::SubjectOnly => Some(Self::Unfiltered),
			Self::Unfiltered => None,
		}
	}

	/// Filter applied at this stage. `None` means the stage runs unfiltered.
	pub fn filter(self, full: &FilterExpr, cfg: &Relaxation) -> Option<FilterExpr> {
		let fields = match self {
			Self::Strict => return Some(full.clone()),
			Self::CoreConditions => &cfg.core_fields,
			Self::Basic => &cfg.basic_fields,
			Self::SubjectOnly => &cfg.subject_fields,
			Self::Unfiltered => return None,
		};

		full.retain_fields(&|field| fields.iter().any(|name| name == field))
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelaxationStep {
	pub stage: RelaxationStage,
	pub filter: Option<FilterExpr>,
}

/// Ordered index queries for `filter`. Stages whose filter would be empty or identical to the
/// previous step are skipped; the plan always ends with [`RelaxationStage::Unfiltered`].
pub fn plan(filter: Option<&FilterExpr>, cfg: &Relaxation) -> Vec<RelaxationStep> {
	let mut steps: Vec<RelaxationStep> = Vec::new();

	if let Some(full) = filter {
		let mut stage = Some(RelaxationStage::Strict);

		while let Some(current) = stage {
			if current == RelaxationStage::Unfiltered {
				break;
			}
			if let Some(expr) = current.filter(full, cfg) {
				let repeated = steps.last().and_then(|step| step.filter.as_ref()) == Some(&expr);

				if !repeated {
					steps.push(RelaxationStep { stage: current, filter: Some(expr) });
				}
			}

			stage = current.next();
		}
	}

	steps.push(RelaxationStep { stage: RelaxationStage::Unfiltered, filter: None });

	steps
}
