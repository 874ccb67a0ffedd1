//! End-to-end tests: reconciler flows against the HTTP client and a mock
//! identity API.
