//! In-place record transforms.
//!
//! Transforms run only for records the policy matched and only when the
//! combined verdict is not a drop. Within one policy they execute in kind
//! order (remove, redact, rename, add); the compiled policy pre-sorts them.

use triage_policy::{Transform, TransformKind};

use crate::accessor::FieldAccessor;

/// Applies one policy's transform ops in their compiled order.
pub fn apply_all<F, A>(transforms: &[Transform<F>], accessor: &mut A)
where
    F: Copy,
    A: FieldAccessor<Field = F>,
{
    for op in transforms {
        apply(op, accessor);
    }
}

fn apply<F, A>(op: &Transform<F>, accessor: &mut A)
where
    F: Copy,
    A: FieldAccessor<Field = F>,
{
    match op.kind {
        TransformKind::Remove => {
            accessor.remove(&op.target);
        }
        TransformKind::Redact => {
            // Redact rewrites values that exist; it never materializes one.
            if accessor.is_present(&op.target) {
                accessor.set(&op.target, op.value.as_deref().unwrap_or_default());
            }
        }
        TransformKind::Rename => {
            if let Some(to) = &op.to {
                accessor.rename(&op.target, to, op.upsert);
            }
        }
        TransformKind::Add => {
            if op.upsert || !accessor.is_present(&op.target) {
                accessor.set(&op.target, op.value.as_deref().unwrap_or_default());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeRecord;
    use triage_policy::{FieldRef, LogField};

    fn op(kind: TransformKind, target: &str) -> Transform<LogField> {
        Transform {
            kind,
            target: FieldRef::record_attribute(target),
            value: None,
            to: None,
            upsert: false,
        }
    }

    #[test]
    fn remove_deletes_attribute() {
        let mut record = FakeRecord::<LogField>::new().with_attr("secret", "hunter2");
        apply_all(&[op(TransformKind::Remove, "secret")], &mut record);
        assert_eq!(record.attr("secret"), None);
    }

    #[test]
    fn redact_replaces_present_value_only() {
        let mut record = FakeRecord::<LogField>::new().with_attr("token", "abc123");
        let mut redact = op(TransformKind::Redact, "token");
        redact.value = Some("[REDACTED]".to_string());
        apply_all(std::slice::from_ref(&redact), &mut record);
        assert_eq!(record.attr("token"), Some("[REDACTED]"));

        // Absent target stays absent.
        let mut empty = FakeRecord::<LogField>::new();
        apply_all(std::slice::from_ref(&redact), &mut empty);
        assert_eq!(empty.attr("token"), None);
    }

    #[test]
    fn rename_moves_value() {
        let mut record = FakeRecord::<LogField>::new().with_attr("a", "x");
        let mut rename = op(TransformKind::Rename, "a");
        rename.to = Some("b".to_string());
        apply_all(std::slice::from_ref(&rename), &mut record);
        assert_eq!(record.attr("a"), None);
        assert_eq!(record.attr("b"), Some("x"));
    }

    #[test]
    fn rename_without_upsert_blocked_by_existing_target() {
        let mut record = FakeRecord::<LogField>::new()
            .with_attr("a", "x")
            .with_attr("b", "y");
        let mut rename = op(TransformKind::Rename, "a");
        rename.to = Some("b".to_string());
        apply_all(std::slice::from_ref(&rename), &mut record);
        assert_eq!(record.attr("a"), Some("x"));
        assert_eq!(record.attr("b"), Some("y"));
    }

    #[test]
    fn rename_with_upsert_overwrites_target() {
        let mut record = FakeRecord::<LogField>::new()
            .with_attr("a", "x")
            .with_attr("b", "y");
        let mut rename = op(TransformKind::Rename, "a");
        rename.to = Some("b".to_string());
        rename.upsert = true;
        apply_all(std::slice::from_ref(&rename), &mut record);
        assert_eq!(record.attr("a"), None);
        assert_eq!(record.attr("b"), Some("x"));
    }

    #[test]
    fn add_respects_upsert() {
        let mut record = FakeRecord::<LogField>::new().with_attr("env", "prod");
        let mut add = op(TransformKind::Add, "env");
        add.value = Some("staging".to_string());
        apply_all(std::slice::from_ref(&add), &mut record);
        assert_eq!(record.attr("env"), Some("prod"));

        add.upsert = true;
        apply_all(std::slice::from_ref(&add), &mut record);
        assert_eq!(record.attr("env"), Some("staging"));

        let mut fresh = FakeRecord::<LogField>::new();
        add.upsert = false;
        apply_all(std::slice::from_ref(&add), &mut fresh);
        assert_eq!(fresh.attr("env"), Some("staging"));
    }

    #[test]
    fn fixed_field_redact() {
        let mut record = FakeRecord::<LogField>::new().with_field(LogField::Body, "password=x");
        let redact = Transform {
            kind: TransformKind::Redact,
            target: FieldRef::Field(LogField::Body),
            value: Some("***".to_string()),
            to: None,
            upsert: false,
        };
        apply_all(std::slice::from_ref(&redact), &mut record);
        assert_eq!(record.field(LogField::Body), Some("***"));
    }
}
