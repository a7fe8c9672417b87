mod settings_store_mock;

// This file organizes the integration tests into a cohesive test suite.
// Each module tests a specific aspect of the application:
// - smoke_tests: Settings, module loading and translations without Discord
// - settings_store_mock: In-memory settings store for prefix resolution
// - router_scenarios: Message routing end to end against a mock gateway
