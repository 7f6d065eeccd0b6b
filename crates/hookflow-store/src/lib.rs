pub mod memory;

pub use memory::MemoryStore;

/// Storage key for a workflow id, e.g. `workflow:<id>`.
pub fn workflow_key(prefix: &str, id: &str) -> String {
    format!("{}{}", prefix, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_key() {
        assert_eq!(workflow_key("workflow:", "abc"), "workflow:abc");
        assert_eq!(workflow_key("", "abc"), "abc");
    }
}
