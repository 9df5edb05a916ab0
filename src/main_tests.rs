    use clap::{CommandFactory, Parser};
    use docsearch::SearchMode;

    use crate::cli::{Cli, Commands};

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search_with_filters() {
        let cli = Cli::try_parse_from([
            "docsearch", "search", "invoice,receipt",
            "--mode", "content",
            "--ext", "pdf, .DOCX",
            "--date-from", "2024-01-01",
            "--date-to", "2024-01-31",
            "--size-from", "10",
            "--whole-word",
            "--max-results", "5",
        ])
        .unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        let query = args.to_query().unwrap();
        assert_eq!(query.mode, SearchMode::Content);
        assert_eq!(query.terms(), vec!["invoice", "receipt"]);
        assert_eq!(query.restricted_types(), Some(vec!["pdf".to_string(), "docx".to_string()]));
        assert_eq!(query.date_from.as_deref(), Some("2024-01-01"));
        assert_eq!(query.size_from, Some(10.0));
        assert!(query.whole_word);
        assert!(!query.case_sensitive);
        assert_eq!(query.max_results, 5);
    }

    #[test]
    fn test_search_defaults_to_filename_mode() {
        let cli = Cli::try_parse_from(["docsearch", "search", "report"]).unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        let query = args.to_query().unwrap();
        assert_eq!(query.mode, SearchMode::Filename);
        assert!(query.restricted_types().is_none());
    }

    #[test]
    fn test_invalid_mode_is_validation_error() {
        let cli = Cli::try_parse_from(["docsearch", "search", "report", "--mode", "regex"]).unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.to_query().unwrap_err().status_code(), 400);
    }

    #[test]
    fn test_add_folder_requires_a_path() {
        assert!(Cli::try_parse_from(["docsearch", "add-folder"]).is_err());
        let cli = Cli::try_parse_from(["docsearch", "add-folder", "/a", "/b"]).unwrap();
        let Commands::AddFolder(args) = cli.command else {
            panic!("expected add-folder command");
        };
        assert_eq!(args.folders.len(), 2);
    }

    #[test]
    fn test_global_args_build_settings() {
        let cli = Cli::try_parse_from([
            "docsearch", "list-folders",
            "--storage", "/tmp/docsearch-test",
            "--exts", ".md,TXT",
            "--everything-url", "http://10.0.0.5:8080",
            "--enable-watcher",
        ])
        .unwrap();
        let settings = cli.global.settings();
        assert!(settings.storage_dir().ends_with("docsearch-test"));
        assert_eq!(settings.allowed_exts, vec!["md", "txt"]);
        assert_eq!(settings.everything_url, "http://10.0.0.5:8080");
        assert!(settings.enable_watcher);
    }

    #[test]
    fn test_serve_args_apply() {
        let cli = Cli::try_parse_from(["docsearch", "serve", "--watch", "--debounce-ms", "250", "--bulk-threshold", "10"]).unwrap();
        let Commands::Serve(args) = cli.command else {
            panic!("expected serve command");
        };
        let mut settings = docsearch::Settings::default();
        args.apply(&mut settings);
        assert!(settings.enable_watcher);
        assert_eq!(settings.debounce.as_millis(), 250);
        assert_eq!(settings.bulk_threshold, 10);
    }
