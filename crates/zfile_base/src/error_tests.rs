/* 📖 # Why use a separate file for these error tests?

Some cases below verify span traces. Keeping them out of error.rs means edits to the
error module do not shift the spans these tests set up.
*/

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{ResultExt, ZFileError, ZFileResult};
    use expect_test::expect;
    use std::error::Error;
    use std::io;
    use tracing::span;
    use tracing_error::ErrorLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    /// Set up tracing with ErrorLayer for tests.
    /// Uses `try_init()` to handle multiple tests running concurrently.
    fn setup_tracing_subscriber() {
        let _ = tracing_subscriber::registry()
            .with(ErrorLayer::default())
            .try_init();
    }

    #[test]
    fn test_io_not_found_is_classified() {
        let error = ZFileError::io("save/player", io::Error::from(io::ErrorKind::NotFound));
        assert!(error.is_not_found());
        match error.kind() {
            ErrorKind::NotFound { path } => assert_eq!(path, "save/player"),
            other => panic!("Expected NotFound, got {other}"),
        }
    }

    #[test]
    fn test_io_already_exists_is_classified() {
        let error = ZFileError::io(
            "save/player",
            io::Error::from(io::ErrorKind::AlreadyExists),
        );
        assert!(error.is_already_exists());
        assert!(!error.is_io());
    }

    #[test]
    fn test_io_other_keeps_source() {
        let error = ZFileError::io("a.txt", io::Error::other("disk on fire"));
        assert!(error.is_io());
        assert_eq!(error.source().unwrap().to_string(), "disk on fire");
    }

    #[test]
    fn test_io_unsupported_is_classified() {
        let error = ZFileError::io("a.txt", io::Error::from(io::ErrorKind::Unsupported));
        assert!(matches!(error.kind(), ErrorKind::Unsupported { .. }));
    }

    #[test]
    fn test_error_context_attachment() {
        let error = ZFileError::message("original error")
            .context("first context")
            .context("second context");

        assert_eq!(error.get_context().len(), 2);
        assert_eq!(error.get_context()[0], "first context");
        assert_eq!(error.get_context()[1], "second context");
    }

    #[test]
    fn test_error_with_context_lazy_evaluation() {
        let mut called = false;
        let error = ZFileError::message("error").with_context(|| {
            called = true;
            "lazy context".to_string()
        });

        assert!(called);
        assert_eq!(error.get_context()[0], "lazy context");
    }

    #[test]
    fn test_error_display_variants() {
        assert_eq!(
            ZFileError::new(ErrorKind::NotFound {
                path: "/tmp/x".to_string()
            })
            .to_string(),
            "Not found: /tmp/x"
        );
        assert_eq!(
            ZFileError::invalid_argument("path too long").to_string(),
            "Invalid argument: path too long"
        );
        assert_eq!(
            ZFileError::new(ErrorKind::Unsupported {
                operation: "lock".to_string()
            })
            .to_string(),
            "Unsupported operation: lock"
        );
    }

    #[test]
    fn test_error_display_with_multiple_contexts() {
        let error = ZFileError::message("root error")
            .context("first")
            .context("second")
            .context("third");
        assert_eq!(error.to_string(), "first: second: third: root error");
    }

    #[test]
    fn test_error_source_message() {
        let error = ZFileError::message("test").context("while testing");
        assert!(error.source().is_none());
    }

    #[test]
    fn test_result_ext_chaining() {
        let result: ZFileResult<i32> = Err(Box::new(ZFileError::message("root")));
        let err = result
            .context("step 1")
            .context("step 2")
            .with_context(|| "step 3".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "step 1: step 2: step 3: root");
    }

    #[test]
    fn test_result_ext_success_untouched() {
        let result: ZFileResult<i32> = Ok(42);
        assert_eq!(result.context("unused").unwrap(), 42);
    }

    #[test]
    fn test_err_macro_formats() {
        let error = crate::err!("bad chunk {} of {}", 3, 7);
        assert_eq!(error.to_string(), "bad chunk 3 of 7");
    }

    #[test]
    fn test_debug_tree_without_span() {
        let error = ZFileError::message("outer error").context("outer context");

        expect![[r#"
            outer error
            └─ outer context

        "#]]
        .assert_debug_eq(&error);
    }

    #[test]
    fn test_debug_tree_with_multiple_contexts() {
        let error = ZFileError::io("save/3", io::Error::other("disk full"))
            .context("Failed to write save slot")
            .context("Failed to copy '/tmp/3' to 'save/3'");

        expect![[r#"
            I/O error at save/3: disk full
            ├─ Failed to write save slot
            └─ Failed to copy '/tmp/3' to 'save/3'

        "#]]
        .assert_debug_eq(&error);
    }

    #[test]
    fn test_debug_includes_span_information() {
        setup_tracing_subscriber();

        let operation_span = span!(tracing::Level::DEBUG, "open_save_file", slot = 3);
        let _guard = operation_span.enter();

        let error = ZFileError::io("save/3", io::Error::from(io::ErrorKind::AlreadyExists));
        let debug = format!("{:?}", error);

        assert!(debug.starts_with("Already exists: save/3\n"));
        assert!(debug.contains("Trace:"));
        assert!(debug.contains("open_save_file"));
        assert!(debug.contains("slot=3"));
    }
}
