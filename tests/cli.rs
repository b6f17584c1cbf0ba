#[test]
fn cli_tests() {
    trycmd::TestCases::new()
        .env("RUST_BACKTRACE", "0")
        .case("tests/cmd/*.toml");
}
