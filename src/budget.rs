//! Per-invocation ceilings on costly tool calls.
//!
//! Exhaustion is not an error: callers hand the refusal text back to the
//! model so it can finish with the data it already has.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info};

pub const DEFAULT_PAGE_BUDGET: usize = 25;
pub const SCREENSHOT_BUDGET: usize = 6;

/// Page visits allowed for a `site_depth` value.
pub fn page_budget_for_depth(depth: u32) -> usize {
    match depth {
        0 => 10,
        1 => 25,
        2 => 50,
        _ => DEFAULT_PAGE_BUDGET,
    }
}

/// Decrement `counter` unless it already reached `max`.
fn take_slot(counter: &AtomicUsize, max: usize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
            (used < max).then_some(used + 1)
        })
        .is_ok()
}

/// Page fetch counter, sized by site depth.
#[derive(Debug)]
pub struct PageBudget {
    depth: u32,
    budget: usize,
    used: AtomicUsize,
}

impl PageBudget {
    pub fn for_depth(depth: u32) -> Self {
        Self {
            depth,
            budget: page_budget_for_depth(depth),
            used: AtomicUsize::new(0),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.budget.saturating_sub(self.used())
    }

    /// Claim one page visit. Returns the refusal text when the budget is spent.
    pub fn try_consume(&self) -> Result<(), String> {
        if take_slot(&self.used, self.budget) {
            debug!(used = self.used(), budget = self.budget, "Page budget consumed");
            Ok(())
        } else {
            info!(budget = self.budget, depth = self.depth, "Page budget exhausted");
            Err(self.refusal())
        }
    }

    pub fn refusal(&self) -> String {
        format!(
            "Page budget exhausted ({} pages for site_depth={}). Please produce your output with the data you have. Visited so far: {} pages.",
            self.budget,
            self.depth,
            self.used()
        )
    }

    /// Prefix for free tool responses so the model can pace itself.
    pub fn remaining_banner(&self) -> String {
        format!("[{} page visits remaining in budget]\n\n", self.remaining())
    }
}

/// Counter for visual captures, independent of site depth.
#[derive(Debug)]
pub struct ScreenshotBudget {
    max: usize,
    used: AtomicUsize,
}

impl Default for ScreenshotBudget {
    fn default() -> Self {
        Self::new(SCREENSHOT_BUDGET)
    }
}

impl ScreenshotBudget {
    pub fn new(max: usize) -> Self {
        Self {
            max,
            used: AtomicUsize::new(0),
        }
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    pub fn try_acquire(&self) -> Result<(), String> {
        if take_slot(&self.used, self.max) {
            Ok(())
        } else {
            Err(self.refusal())
        }
    }

    /// Give back a slot after a failed capture.
    pub fn refund(&self) {
        let _ = self
            .used
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| used.checked_sub(1));
    }

    pub fn refusal(&self) -> String {
        format!(
            "Screenshot budget reached ({} max). Use browse_page or extract_css for remaining sites.",
            self.max
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_depth_table() {
        assert_eq!(page_budget_for_depth(0), 10);
        assert_eq!(page_budget_for_depth(1), 25);
        assert_eq!(page_budget_for_depth(2), 50);
        assert_eq!(page_budget_for_depth(7), DEFAULT_PAGE_BUDGET);
    }

    #[test]
    fn test_exactly_budget_calls_succeed() {
        for depth in [0, 1, 2, 3] {
            let budget = PageBudget::for_depth(depth);
            let expected = page_budget_for_depth(depth);
            for _ in 0..expected {
                assert!(budget.try_consume().is_ok());
            }
            let refusal = budget.try_consume().unwrap_err();
            assert!(refusal.contains(&format!("({} pages for site_depth={})", expected, depth)));
            assert_eq!(budget.used(), expected);
            assert_eq!(budget.remaining(), 0);
        }
    }

    #[test]
    fn test_concurrent_consumers_never_overshoot() {
        let budget = Arc::new(PageBudget::for_depth(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let budget = budget.clone();
                std::thread::spawn(move || (0..5).filter(|_| budget.try_consume().is_ok()).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 10);
    }

    #[test]
    fn test_banner_reports_remaining() {
        let budget = PageBudget::for_depth(0);
        budget.try_consume().unwrap();
        assert_eq!(budget.remaining_banner(), "[9 page visits remaining in budget]\n\n");
    }

    #[test]
    fn test_screenshot_refund() {
        let shots = ScreenshotBudget::new(2);
        shots.try_acquire().unwrap();
        shots.try_acquire().unwrap();
        assert!(shots.try_acquire().unwrap_err().contains("(2 max)"));
        shots.refund();
        assert!(shots.try_acquire().is_ok());
        assert_eq!(shots.used(), 2);
    }

    #[test]
    fn test_refund_never_underflows() {
        let shots = ScreenshotBudget::default();
        shots.refund();
        assert_eq!(shots.used(), 0);
    }
}
