//! Integration tests for use-cdn

mod transport_tests {
    use use_cdn::network::{HttpTransport, RedirectProbe, Transport};
    use use_cdn::UseCdnError;
    use wiremock::matchers::{method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    struct AcceptsAbbreviatedDocument;

    impl Match for AcceptsAbbreviatedDocument {
        fn matches(&self, request: &Request) -> bool {
            request
                .headers
                .get("accept")
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains("application/vnd.npm.install-v1+json"))
        }
    }

    #[tokio::test]
    async fn get_bytes_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foo@1.0.0/a.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
            .expect(1)
            .mount(&server)
            .await;

        let body = HttpTransport::default()
            .get_bytes(&format!("{}/foo@1.0.0/a.js", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"console.log(1)");
    }

    #[tokio::test]
    async fn get_bytes_reports_status() {
        let server = MockServer::start().await;

        let err = HttpTransport::default()
            .get_bytes(&format!("{}/missing.js", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, UseCdnError::HttpStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn get_text_sends_accept_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jquery"))
            .and(AcceptsAbbreviatedDocument)
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let body = HttpTransport::default()
            .get_text(
                &format!("{}/jquery", server.uri()),
                "application/vnd.npm.install-v1+json",
            )
            .await
            .unwrap();
        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn get_redirect_does_not_follow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foo@latest"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/foo@1.0.0/foo.js"),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/foo@1.0.0/foo.js"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = HttpTransport::default()
            .get_redirect(&format!("{}/foo@latest", server.uri()))
            .await
            .unwrap();
        assert_eq!(outcome, RedirectProbe::Redirect("/foo@1.0.0/foo.js".to_string()));
    }

    #[tokio::test]
    async fn get_redirect_reports_non_redirect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foo@latest"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let outcome = HttpTransport::default()
            .get_redirect(&format!("{}/foo@latest", server.uri()))
            .await
            .unwrap();
        assert_eq!(outcome, RedirectProbe::NotRedirect(200));
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let err = HttpTransport::default()
            .get_bytes("http://127.0.0.1:9/nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, UseCdnError::Network { .. }));
    }
}

mod resolve_tests {
    use std::collections::HashMap;
    use tempfile::TempDir;
    use use_cdn::config::{CdnConfig, ResolverConfig};
    use use_cdn::{resolved_files, Config, Orchestrator, Overrides, PackageSpec, UseCdnError};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_body(server: &MockServer, at: &str, body: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(times)
            .mount(server)
            .await;
    }

    async fn mount_redirect(server: &MockServer, at: &str, location: &str, times: u64) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", location))
            .expect(times)
            .mount(server)
            .await;
    }

    fn unpkg_config(server: &MockServer, packages: Vec<PackageSpec>) -> Config {
        let mut cdns = HashMap::new();
        cdns.insert(
            "unpkg".to_string(),
            CdnConfig {
                url: Some(server.uri()),
                resolver: None,
            },
        );
        Config {
            cdns,
            ..Config::from_packages(packages)
        }
    }

    async fn run(config: Config, root: &std::path::Path) -> Result<Vec<std::path::PathBuf>, UseCdnError> {
        let orchestrator = Orchestrator::new(config).with_cache_dir(root);
        orchestrator.init().await?;
        orchestrator.resolve().await
    }

    #[tokio::test]
    async fn unpkg_with_native_resolver() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/foo@1.0.0", "/foo@1.0.0/foo.js", 1).await;
        mount_body(&server, "/foo@1.0.0/a.js", "a", 1).await;
        // Absolute Location, as some CDNs send
        mount_redirect(
            &server,
            "/bar@latest",
            &format!("{}/bar@3.0.0/index.js", server.uri()),
            1,
        )
        .await;
        mount_body(&server, "/bar@3.0.0/else.js", "else", 1).await;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".use-cdn");
        let config = unpkg_config(
            &server,
            vec![
                PackageSpec::new("foo", "1.0.0", vec!["a.js".into()]),
                PackageSpec::new("bar", "latest", vec!["else.js".into()]),
            ],
        );

        let paths = run(config, &root).await.unwrap();
        assert_eq!(paths[0], root.join("cache/foo/1.0.0/a.js"));
        assert_eq!(paths[1], root.join("cache/bar/3.0.0/else.js"));
        assert_eq!(std::fs::read_to_string(&paths[1]).unwrap(), "else");
        assert_eq!(
            std::fs::read_link(root.join("cache/bar/latest")).unwrap(),
            std::path::PathBuf::from("3.0.0")
        );
        assert!(std::fs::symlink_metadata(root.join("cache/foo/1.0.0"))
            .unwrap()
            .is_dir());
    }

    #[tokio::test]
    async fn cdnjs_with_npm_registry() {
        let server = MockServer::start().await;
        mount_body(
            &server,
            "/bootstrap",
            r#"{"name":"bootstrap","dist-tags":{"latest":"4.0.0"},"versions":{"3.3.7":{},"3.4.1":{},"4.0.0":{}}}"#,
            1,
        )
        .await;
        mount_body(
            &server,
            "/jquery",
            r#"{"name":"jquery","dist-tags":{"latest":"3.4.1"},"versions":{"3.4.1":{}}}"#,
            1,
        )
        .await;
        mount_body(
            &server,
            "/ajax/libs/twitter-bootstrap/3.4.1/css/bootstrap.css",
            "body{}",
            1,
        )
        .await;
        mount_body(&server, "/ajax/libs/jquery/3.4.1/jquery.min.js", "$", 1).await;

        let mut config = Config::from_packages(vec![
            PackageSpec::new("twitter-bootstrap", "3", vec!["css/bootstrap.css".into()])
                .with_resolve_as("bootstrap"),
            PackageSpec::new("jquery", "latest", vec!["jquery.min.js".into()]),
        ]);
        config.cdn = Some("cdnjs".to_string());
        config.cdns.insert(
            "cdnjs".to_string(),
            CdnConfig {
                url: Some(server.uri()),
                resolver: None,
            },
        );
        config.resolvers.insert(
            "npm".to_string(),
            ResolverConfig {
                url: Some(server.uri()),
            },
        );

        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".use-cdn");
        let paths = run(config.clone(), &root).await.unwrap();

        assert_eq!(
            paths,
            vec![
                root.join("cache/twitter-bootstrap/3.4.1/css/bootstrap.css"),
                root.join("cache/jquery/3.4.1/jquery.min.js"),
            ]
        );
        assert_eq!(
            std::fs::read_link(root.join("cache/jquery/latest")).unwrap(),
            std::path::PathBuf::from("3.4.1")
        );

        let listed = resolved_files(&config, &Overrides::default(), &root).unwrap();
        assert_eq!(listed, paths);
    }

    #[tokio::test]
    async fn second_run_reuses_cached_files() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/foo@latest", "/foo@1.0.0/foo.js", 2).await;
        mount_body(&server, "/foo@1.0.0/a.js", "a", 1).await;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".use-cdn");
        let packages = || vec![PackageSpec::new("foo", "latest", vec!["a.js".into()])];

        let first = run(unpkg_config(&server, packages()), &root).await.unwrap();
        let second = run(unpkg_config(&server, packages()), &root).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn failed_download_leaves_no_entry() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/foo@latest", "/foo@1.0.0/foo.js", 1).await;
        Mock::given(method("GET"))
            .and(path("/foo@1.0.0/a.js"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let root = temp.path().join(".use-cdn");
        let config = unpkg_config(
            &server,
            vec![PackageSpec::new("foo", "latest", vec!["a.js".into()])],
        );

        let err = run(config, &root).await.unwrap_err();
        assert!(matches!(err, UseCdnError::HttpStatus { status: 500, .. }));
        assert!(!root.join("cache/foo/1.0.0/a.js").exists());
    }

    #[tokio::test]
    async fn redirect_to_other_package_fails() {
        let server = MockServer::start().await;
        mount_redirect(&server, "/foo@latest", "/bar@1.0.0/index.js", 1).await;

        let temp = TempDir::new().unwrap();
        let config = unpkg_config(
            &server,
            vec![PackageSpec::new("foo", "latest", vec!["a.js".into()])],
        );

        let err = run(config, &temp.path().join(".use-cdn")).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "foo@latest resolves to a different package: /bar@1.0.0/index.js"
        );
    }
}

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::path::Path;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn use_cdn(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("use-cdn");
        cmd.current_dir(dir)
            .env_remove("USE_CDN_CONFIG")
            .env_remove("USE_CDN_CACHE_DIR")
            .env_remove("USE_CDN_OVERRIDES");
        cmd
    }

    #[test]
    fn help_displays() {
        let temp = TempDir::new().unwrap();
        use_cdn(temp.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("front-end assets"));
    }

    #[test]
    fn version_displays() {
        let temp = TempDir::new().unwrap();
        use_cdn(temp.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("use-cdn"));
    }

    #[test]
    fn resolve_without_config_fails() {
        let temp = TempDir::new().unwrap();
        use_cdn(temp.path())
            .arg("resolve")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn invalid_config_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("use-cdn.toml"), "packages = 3").unwrap();
        use_cdn(temp.path())
            .arg("resolve")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn unsupported_cdn_fails_with_hint() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("use-cdn.toml"),
            "[[packages]]\npackage = \"foo\"\ncdn = \"nonexistent\"\nversion = \"1.0.0\"\nfiles = [\"a.js\"]\n",
        )
        .unwrap();
        use_cdn(temp.path())
            .arg("resolve")
            .assert()
            .failure()
            .stderr(predicate::str::contains("unsupported cdn: nonexistent"))
            .stderr(predicate::str::contains("Supported CDNs"));
    }

    #[test]
    fn malformed_override_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("use-cdn.toml"),
            "[[packages]]\npackage = \"foo\"\nversion = \"1.0.0\"\nfiles = [\"a.js\"]\n",
        )
        .unwrap();
        use_cdn(temp.path())
            .arg("resolve")
            .env("USE_CDN_OVERRIDES", "foo")
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "package foo overridden without a version specification",
            ));
    }

    #[test]
    fn cache_path_defaults() {
        let temp = TempDir::new().unwrap();
        use_cdn(temp.path())
            .args(["cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains(".use-cdn"));
    }

    #[test]
    fn cache_path_follows_flag() {
        let temp = TempDir::new().unwrap();
        use_cdn(temp.path())
            .args(["--cache-dir", "vendor/assets", "cache", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("vendor/assets"));
    }

    #[test]
    fn cache_info_on_foreign_directory_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join(".use-cdn")).unwrap();
        use_cdn(temp.path())
            .args(["cache", "info"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("is not a use-cdn directory"));
    }

    #[test]
    fn list_before_resolve_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("use-cdn.json"),
            r#"[{"package": "foo", "version": "1.0.0", "files": ["a.js"]}]"#,
        )
        .unwrap();
        use_cdn(temp.path())
            .args(["--config", "use-cdn.json", "list"])
            .assert()
            .failure();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn resolve_then_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/foo@latest"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", "/foo@1.0.0/foo.js"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/foo@1.0.0/a.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a"))
            .expect(1)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("use-cdn.toml"),
            format!(
                "[cdns.unpkg]\nurl = \"{}\"\n\n[[packages]]\npackage = \"foo\"\nversion = \"latest\"\nfiles = [\"a.js\"]\n",
                server.uri()
            ),
        )
        .unwrap();
        let expected = Path::new(".use-cdn")
            .join("cache/foo/1.0.0/a.js")
            .display()
            .to_string();

        use_cdn(temp.path())
            .args(["resolve", "--print"])
            .assert()
            .success()
            .stdout(predicate::str::contains(expected.as_str()));

        use_cdn(temp.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains(expected.as_str()));

        use_cdn(temp.path())
            .args(["cache", "info", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"foo\""));
    }
}
