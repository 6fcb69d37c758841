//! Per-symbol eligibility and outcome tracking for one fetch job.

use std::collections::HashMap;

use super::error::FetchError;

/// Decided once, when the job is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    AttemptFetch,
    DoNotAttemptFetch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    NotAttempted,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolFetchState {
    symbols: Vec<String>,
    index: HashMap<String, usize>,
    eligibility: Vec<Eligibility>,
    outcomes: Vec<Outcome>,
}

impl SymbolFetchState {
    /// Track `symbols` in order. Duplicates keep their first position.
    pub fn new<I, S>(symbols: I, do_not_attempt: &[&str]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = Self {
            symbols: Vec::new(),
            index: HashMap::new(),
            eligibility: Vec::new(),
            outcomes: Vec::new(),
        };
        for symbol in symbols {
            let symbol = symbol.into();
            let eligibility = if do_not_attempt.contains(&symbol.as_str()) {
                Eligibility::DoNotAttemptFetch
            } else {
                Eligibility::AttemptFetch
            };
            state.push(symbol, eligibility);
        }
        state
    }

    fn push(&mut self, symbol: String, eligibility: Eligibility) {
        if self.index.contains_key(&symbol) {
            return;
        }
        self.index.insert(symbol.clone(), self.symbols.len());
        self.symbols.push(symbol);
        self.eligibility.push(eligibility);
        self.outcomes.push(Outcome::NotAttempted);
    }

    /// A fresh state over `symbols`, keeping each one's eligibility.
    pub fn subset<'a, I>(&self, symbols: I) -> Result<Self, FetchError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = Self::new(Vec::<String>::new(), &[]);
        for symbol in symbols {
            let i = self.position(symbol)?;
            state.push(symbol.to_string(), self.eligibility[i]);
        }
        Ok(state)
    }

    pub fn all(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.index.contains_key(symbol)
    }

    pub fn position(&self, symbol: &str) -> Result<usize, FetchError> {
        self.index
            .get(symbol)
            .copied()
            .ok_or_else(|| FetchError::UnknownSymbol(symbol.to_string()))
    }

    pub fn eligibility(&self, symbol: &str) -> Option<Eligibility> {
        self.index.get(symbol).map(|&i| self.eligibility[i])
    }

    pub fn is_eligible(&self, symbol: &str) -> bool {
        self.eligibility(symbol) == Some(Eligibility::AttemptFetch)
    }

    pub fn outcome(&self, symbol: &str) -> Option<Outcome> {
        self.index.get(symbol).map(|&i| self.outcomes[i])
    }

    /// Record one attempt. A failure never replaces an earlier success.
    pub fn update(&mut self, symbol: &str, success: bool) -> Result<(), FetchError> {
        let i = self.position(symbol)?;
        let outcome = &mut self.outcomes[i];
        *outcome = match (success, *outcome) {
            (true, _) => Outcome::Succeeded,
            (false, Outcome::Succeeded) => Outcome::Succeeded,
            (false, _) => Outcome::Failed,
        };
        Ok(())
    }

    fn select(&self, pred: impl Fn(usize) -> bool) -> Vec<&str> {
        (0..self.symbols.len())
            .filter(|&i| pred(i))
            .map(|i| self.symbols[i].as_str())
            .collect()
    }

    pub fn succeeded(&self) -> Vec<&str> {
        self.select(|i| self.outcomes[i] == Outcome::Succeeded)
    }

    pub fn failed(&self) -> Vec<&str> {
        self.select(|i| self.outcomes[i] == Outcome::Failed)
    }

    pub fn attempt_fetch(&self) -> Vec<&str> {
        self.select(|i| self.eligibility[i] == Eligibility::AttemptFetch)
    }

    pub fn do_not_attempt_fetch(&self) -> Vec<&str> {
        self.select(|i| self.eligibility[i] == Eligibility::DoNotAttemptFetch)
    }

    /// Symbols left without data: failures first, then the ineligible ones.
    pub fn empty(&self) -> Vec<&str> {
        let mut out = self.failed();
        out.extend(self.select(|i| {
            self.eligibility[i] == Eligibility::DoNotAttemptFetch
                && self.outcomes[i] != Outcome::Failed
        }));
        out
    }
}
