//! Fixed-threshold accumulation of post texts.

/// Ordered post texts collected by one worker until the threshold is reached.
#[derive(Debug)]
pub struct Batch {
    texts: Vec<String>,
    threshold: usize,
}

impl Batch {
    /// Creates an empty batch. A zero threshold is treated as one.
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            texts: Vec::with_capacity(threshold),
            threshold,
        }
    }

    /// Appends a text and reports whether the batch is now full.
    #[inline]
    pub fn push(&mut self, text: String) -> bool {
        self.texts.push(text);
        self.is_full()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.texts.len() >= self.threshold
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Hands out the accumulated texts, leaving the batch empty.
    pub fn take(&mut self) -> Vec<String> {
        std::mem::replace(&mut self.texts, Vec::with_capacity(self.threshold))
    }

    pub fn clear(&mut self) {
        self.texts.clear();
    }

    /// Renders the texts as a JSON array for diagnostics.
    pub fn to_json(&self) -> String {
        render_texts(&self.texts)
    }
}

/// Renders a list of texts as a JSON array.
pub fn render_texts(texts: &[String]) -> String {
    serde_json::to_string(texts).unwrap_or_else(|e| format!("<unrenderable batch: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_full_at_threshold() {
        let mut batch = Batch::new(2);
        assert!(!batch.push("a".into()));
        assert!(batch.push("b".into()));
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn take_leaves_batch_empty_and_preserves_order() {
        let mut batch = Batch::new(3);
        batch.push("a".into());
        batch.push("b".into());
        assert_eq!(batch.take(), vec!["a", "b"]);
        assert!(batch.is_empty());
        assert!(!batch.push("c".into()));
    }

    #[test]
    fn zero_threshold_behaves_as_one() {
        let mut batch = Batch::new(0);
        assert_eq!(batch.threshold(), 1);
        assert!(batch.push("only".into()));
    }

    #[test]
    fn renders_json_for_diagnostics() {
        let mut batch = Batch::new(4);
        batch.push("hello \"world\"".into());
        assert_eq!(batch.to_json(), r#"["hello \"world\""]"#);
    }
}
