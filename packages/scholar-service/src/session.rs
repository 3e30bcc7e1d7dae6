use std::{
	collections::{HashMap, HashSet},
	sync::Mutex,
};

/// Documents already handed out during one generation job.
///
/// Searches that receive a session exclude its documents and record their own picks. Reading the
/// exclusions, selecting, and recording happen under one lock, so concurrent searches sharing a
/// session never return the same document twice.
#[derive(Debug)]
pub struct SearchSession {
	job_id: String,
	usage: Mutex<UsageLedger>,
}
impl SearchSession {
	pub fn new(job_id: impl Into<String>) -> Self {
		Self { job_id: job_id.into(), usage: Mutex::new(UsageLedger::default()) }
	}

	pub fn job_id(&self) -> &str {
		&self.job_id
	}

	pub fn used_ids(&self) -> HashSet<String> {
		self.with_ledger(|ledger| ledger.counts.keys().cloned().collect())
	}

	pub fn usage_count(&self, id: &str) -> u32 {
		self.with_ledger(|ledger| ledger.counts.get(id).copied().unwrap_or(0))
	}

	pub fn record<I, S>(&self, ids: I)
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		self.with_ledger(|ledger| {
			for id in ids {
				ledger.record(id.as_ref());
			}
		});
	}

	pub(crate) fn with_ledger<R>(&self, f: impl FnOnce(&mut UsageLedger) -> R) -> R {
		let mut ledger = self.usage.lock().unwrap_or_else(|err| err.into_inner());

		f(&mut ledger)
	}
}

#[derive(Debug, Default)]
pub(crate) struct UsageLedger {
	counts: HashMap<String, u32>,
}
impl UsageLedger {
	pub(crate) fn ids(&self) -> impl Iterator<Item = &String> {
		self.counts.keys()
	}

	pub(crate) fn record(&mut self, id: &str) {
		*self.counts.entry(id.to_string()).or_insert(0) += 1;
	}
}
