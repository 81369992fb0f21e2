//! Fake test programs and expectations used across the test suites

/// Standard test data and fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Watchdog used by tests that exercise hangs
    pub const SHORT_TIMEOUT_MS: u64 = 1000;

    /// List-then-filter binary with one case per outcome
    pub const GTEST_PROGRAM: &'static str = r#"#!/bin/sh
case "$1" in
    --gtest_list_tests)
        echo "Group."
        echo "  Pass"
        echo "  Fail"
        echo "  Crash"
        echo "  Hang"
        echo "  Skipped  # known bad"
        ;;
    --gtest_filter=Group.Pass)
        echo "[ RUN      ] Group.Pass"
        echo "[       OK ] Group.Pass"
        ;;
    --gtest_filter=Group.Fail)
        echo "[ RUN      ] Group.Fail"
        echo "[  FAILED  ] Group.Fail"
        exit 1
        ;;
    --gtest_filter=Group.Crash)
        kill -SEGV $$
        ;;
    --gtest_filter=Group.Hang)
        echo "[ RUN      ] Group.Hang"
        sleep 30
        ;;
    *)
        echo "unexpected arguments: $*"
        exit 2
        ;;
esac
"#;

    /// List-then-filter binary that cannot list its cases
    pub const BROKEN_LISTING_PROGRAM: &'static str = "#!/bin/sh\necho 'cannot list' >&2\nexit 3\n";

    /// Single-process launcher: runs the program given as its last argument
    pub const LAUNCHER: &'static str = r#"#!/bin/sh
for program; do :; done
exec "$program"
"#;

    /// Single-process program: one pass, one failure
    pub const GLIB_PROGRAM: &'static str = r#"#!/bin/sh
echo "/a/one: OK"
echo "/a/two: FAIL"
exit 1
"#;

    /// Single-process program whose inner case process hangs, then recovers
    pub const GLIB_HANG_PROGRAM: &'static str = r#"#!/bin/sh
echo "/a/one: OK"
echo "/a/hang:"
sh -c 'echo "TEST: hang (pid=$$)"; exec sleep 30'
echo "FAIL"
echo "/a/after: OK"
"#;

    /// Single-process program that hangs without naming its case process
    pub const GLIB_STUCK_PROGRAM: &'static str = r#"#!/bin/sh
echo "/a/stuck:"
sleep 30
echo "/a/stuck: OK"
"#;

    /// Expectations skipping one case of [`Self::GTEST_PROGRAM`]
    pub const EXPECTATIONS: &'static str = r#"{
        "skipped": [
            {"test": "WTF/TestGroup", "case": "Group.Skipped", "reason": "Known bad", "bug": 1234}
        ],
        "slow": []
    }"#;

    /// Program that leaves a marker file next to itself when it runs
    pub fn marker_program(marker: &str) -> String {
        format!("#!/bin/sh\ntouch \"$(dirname \"$0\")/{marker}\"\n")
    }
}
