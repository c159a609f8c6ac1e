use fibre_inject::{inject_from, Args, Injectable, InstancePolicy, Registry};

// A production container type, and a test variant that swaps one value out.
// Everything declared on top of `port` follows the override.

fn main() -> fibre_inject::Result<()> {
  let registry = Registry::builder().instance_policy(InstancePolicy::Unique).build();

  let mut services = registry.declare("Services");
  let port = services.bind("port", Injectable::constant(443_u16))?;
  let endpoint = services.bind(
    "endpoint",
    Injectable::new(|args: &Args| Ok(format!("https://api.example.com:{}", args.get::<u16>(0)?))).arg(&port),
  )?;
  let services = services.finish()?;

  let mut test_services = registry.declare_extending("TestServices", &services)?;
  test_services.bind("port", Injectable::constant(8443_u16))?;
  let test_services = test_services.finish()?;

  // Lookups for `Services` are answered by the initialized subtype.
  registry.instantiate(&test_services)?.initialize()?;
  let endpoint = inject_from!(registry, endpoint, String);
  println!("Resolved endpoint: {}", endpoint);
  assert_eq!(*endpoint, "https://api.example.com:8443");

  // Under the unique policy a second instance cannot be published.
  let second = registry.instantiate(&test_services)?;
  match second.initialize() {
    Err(err) => println!("Second instance rejected: {}", err),
    Ok(()) => unreachable!("the unique policy admits one instance per type"),
  }
  Ok(())
}
