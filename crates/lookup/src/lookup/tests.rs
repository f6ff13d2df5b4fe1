use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::provider::{companion_provider_fn, object_provider_fn};
use crate::testing::{Tank, TestWorld};
use crate::world::{CompanionObject, downcast_companion};

fn fuel_lookup() -> Lookup<u32, ()> {
	Lookup::new(
		CapabilityId::of::<u32, ()>("test:fuel").unwrap(),
		ConflictPolicy::Warn,
	)
}

fn constant(value: u32) -> ObjectProviderRef<u32, ()> {
	object_provider_fn(move |_, _, _, _: &()| Some(value))
}

fn tank_amount() -> CompanionProviderRef<u32, ()> {
	companion_provider_fn(|companion: &dyn CompanionObject, _: &()| {
		downcast_companion::<Tank>(companion).map(|tank| tank.amount)
	})
}

#[test]
fn specific_provider_answers_for_its_kind_only() {
	let world = TestWorld::new();
	let log = world.catalog.object_kind("log");
	let at_log = Position::new(0, 64, 0);
	world.place(at_log, log);

	let lookup = fuel_lookup();
	let report = lookup.register_for_object_kinds(constant(300), &[log]).unwrap();
	assert!(report.is_clean());
	assert_eq!(report.installed, vec![ConflictKey::Object(log)]);

	assert_eq!(lookup.get(&world, at_log, &()), Some(300));
	assert_eq!(lookup.get(&world, Position::new(1, 64, 0), &()), None);
}

#[test]
fn specific_beats_fallback_regardless_of_order() {
	let world = TestWorld::new();
	let log = world.catalog.object_kind("log");
	let stone = world.catalog.object_kind("stone");
	let at_log = Position::new(0, 0, 0);
	let at_stone = Position::new(1, 0, 0);
	world.place(at_log, log);
	world.place(at_stone, stone);

	let lookup = fuel_lookup();
	lookup.register_fallback(constant(1));
	lookup.register_for_object_kinds(constant(300), &[log]).unwrap();

	assert_eq!(lookup.get(&world, at_log, &()), Some(300));
	assert_eq!(lookup.get(&world, at_stone, &()), Some(1));
}

#[test]
fn empty_specific_answer_falls_through_to_fallbacks_in_order() {
	let world = TestWorld::new();
	let log = world.catalog.object_kind("log");
	let pos = Position::new(0, 0, 0);
	world.place(pos, log);

	let lookup = fuel_lookup();
	lookup
		.register_for_object_kinds(object_provider_fn(|_, _, _, _: &()| None), &[log])
		.unwrap();
	lookup.register_fallback(object_provider_fn(|_, _, _, _: &()| None));
	lookup.register_fallback(constant(2));
	lookup.register_fallback(constant(3));

	assert_eq!(lookup.get(&world, pos, &()), Some(2));
}

#[test]
fn duplicate_registration_keeps_first_and_records_conflict() {
	let world = TestWorld::new();
	let log = world.catalog.object_kind("log");
	let pos = Position::new(0, 0, 0);
	world.place(pos, log);

	let lookup = fuel_lookup();
	lookup.register_for_object_kinds(constant(300), &[log]).unwrap();
	let report = lookup.register_for_object_kinds(constant(999), &[log]).unwrap();

	assert_eq!(report.conflicting, vec![ConflictKey::Object(log)]);
	assert_eq!(lookup.get(&world, pos, &()), Some(300));
	let conflicts = lookup.conflicts();
	assert_eq!(conflicts.len(), 1);
	assert_eq!(&*conflicts[0].lookup, "test:fuel");
	assert_eq!(conflicts[0].key, ConflictKey::Object(log));
}

#[test]
#[should_panic(expected = "duplicate provider")]
fn panic_policy_rejects_duplicates_loudly() {
	let catalog = crate::kind::KindCatalog::new();
	let log = catalog.object_kind("log");
	let lookup: Lookup<u32, ()> = Lookup::new(
		CapabilityId::of::<u32, ()>("test:fuel").unwrap(),
		ConflictPolicy::Panic,
	);
	lookup.register_for_object_kinds(constant(1), &[log]).unwrap();
	let _ = lookup.register_for_object_kinds(constant(2), &[log]);
}

#[test]
fn registering_for_no_kinds_is_invalid() {
	let lookup = fuel_lookup();
	let err = lookup.register_for_object_kinds(constant(1), &[]).unwrap_err();
	assert!(matches!(err, LookupError::InvalidArgument(_)));
}

#[test]
fn companion_provider_answers_through_attached_object_kinds() {
	let world = TestWorld::new();
	let barrel = world.catalog.object_kind("barrel");
	let cask = world.catalog.object_kind("cask");
	let tank_kind = world.catalog.companion_kind("tank", &[barrel, cask]).unwrap();
	let with_tank = Position::new(0, 0, 0);
	let without_tank = Position::new(1, 0, 0);
	world.place(with_tank, cask);
	world.place(without_tank, barrel);
	world.attach(
		with_tank,
		Tank {
			kind: tank_kind,
			amount: 40,
		},
	);

	let lookup = fuel_lookup();
	let report = lookup
		.register_companion_provider(&world.catalog, tank_amount(), &[tank_kind])
		.unwrap();
	assert_eq!(
		report.installed,
		vec![
			ConflictKey::Companion(tank_kind),
			ConflictKey::Object(barrel),
			ConflictKey::Object(cask),
		]
	);

	assert_eq!(lookup.get(&world, with_tank, &()), Some(40));
	assert_eq!(lookup.get(&world, without_tank, &()), None);
	assert!(lookup.companion_provider(tank_kind).is_some());
	assert!(lookup.provider(cask).unwrap().as_companion().is_some());
}

#[test]
fn wrapped_provider_ignores_companions_of_another_kind() {
	let world = TestWorld::new();
	let barrel = world.catalog.object_kind("barrel");
	let tank_kind = world.catalog.companion_kind("tank", &[barrel]).unwrap();
	let crate_kind = world.catalog.companion_kind("crate", &[barrel]).unwrap();
	let pos = Position::new(0, 0, 0);
	world.place(pos, barrel);
	world.attach(
		pos,
		Tank {
			kind: crate_kind,
			amount: 5,
		},
	);

	let lookup = fuel_lookup();
	lookup
		.register_companion_provider(&world.catalog, tank_amount(), &[tank_kind])
		.unwrap();
	assert_eq!(lookup.get(&world, pos, &()), None);
}

#[test]
fn companion_kind_without_attachments_is_invalid() {
	let world = TestWorld::new();
	let lonely = world.catalog.companion_kind("lonely", &[]).unwrap();
	let lookup = fuel_lookup();
	let err = lookup
		.register_companion_provider(&world.catalog, tank_amount(), &[lonely])
		.unwrap_err();
	assert!(matches!(err, LookupError::InvalidArgument(_)));
	assert!(lookup.object_kinds().is_empty());
}

#[test]
fn register_self_returns_the_companion() {
	#[derive(Clone)]
	struct Battery {
		kind: CompanionKind,
		charge: u64,
	}
	impl CompanionObject for Battery {
		fn kind(&self) -> CompanionKind {
			self.kind
		}
	}

	let world = TestWorld::new();
	let cell = world.catalog.object_kind("cell");
	let battery_kind = world.catalog.companion_kind("battery", &[cell]).unwrap();
	let pos = Position::new(2, 2, 2);
	world.place(pos, cell);
	world.attach(
		pos,
		Battery {
			kind: battery_kind,
			charge: 77,
		},
	);

	let lookup: Lookup<Battery, ()> = Lookup::new(
		CapabilityId::of::<Battery, ()>("test:battery").unwrap(),
		ConflictPolicy::Warn,
	);
	lookup.register_self(&world.catalog, &[battery_kind]).unwrap();
	assert_eq!(lookup.get(&world, pos, &()).map(|b| b.charge), Some(77));
}

#[test]
fn companion_fallbacks_run_after_object_fallbacks() {
	let world = TestWorld::new();
	let pos = Position::new(0, 0, 0);
	let tank_kind = world.catalog.companion_kind("tank", &[world.air]).unwrap();
	world.attach(
		pos,
		Tank {
			kind: tank_kind,
			amount: 12,
		},
	);

	let lookup = fuel_lookup();
	lookup.register_companion_fallback(tank_amount());
	assert_eq!(lookup.get(&world, pos, &()), Some(12));

	lookup.register_fallback(constant(9));
	assert_eq!(lookup.get(&world, pos, &()), Some(9));
	assert_eq!(lookup.fallback_count(), 2);
}

#[test]
fn companion_fallbacks_skip_the_fetch_when_empty() {
	let world = TestWorld::new();
	let lookup = fuel_lookup();
	assert_eq!(lookup.get(&world, Position::new(0, 0, 0), &()), None);
	assert_eq!(world.companion_queries(), 0);
}

#[test]
fn context_reaches_the_provider() {
	let world = TestWorld::new();
	let log = world.catalog.object_kind("log");
	let pos = Position::new(0, 0, 0);
	world.place(pos, log);

	let lookup: Lookup<u32, u32> = Lookup::new(
		CapabilityId::of::<u32, u32>("test:scaled").unwrap(),
		ConflictPolicy::Warn,
	);
	lookup
		.register_for_object_kinds(object_provider_fn(|_, _, _, factor: &u32| Some(10 * factor)), &[log])
		.unwrap();
	assert_eq!(lookup.get(&world, pos, &3), Some(30));
	assert_eq!(lookup.get(&world, pos, &5), Some(50));
}

#[test]
fn find_with_kind_skips_kind_resolution() {
	let world = TestWorld::new();
	let log = world.catalog.object_kind("log");
	let lookup = fuel_lookup();
	lookup.register_for_object_kinds(constant(300), &[log]).unwrap();

	assert_eq!(lookup.find_with_kind(&world, Position::new(0, 0, 0), log, &()), Some(300));
	assert_eq!(world.kind_queries(), 0);
}

#[test]
#[should_panic(expected = "provider failure")]
fn provider_panics_propagate() {
	let world = TestWorld::new();
	let lookup = fuel_lookup();
	lookup.register_fallback(object_provider_fn(|_, _, _, _: &()| -> Option<u32> {
		panic!("provider failure")
	}));
	let _ = lookup.get(&world, Position::new(0, 0, 0), &());
}

#[test]
fn concurrent_queries_see_consistent_answers() {
	let world = TestWorld::new();
	let log = world.catalog.object_kind("log");
	let pos = Position::new(0, 0, 0);
	world.place(pos, log);
	let lookup = fuel_lookup();
	lookup.register_for_object_kinds(constant(300), &[log]).unwrap();
	let hits = AtomicUsize::new(0);

	std::thread::scope(|s| {
		for _ in 0..4 {
			s.spawn(|| {
				for _ in 0..1_000 {
					assert_eq!(lookup.get(&world, pos, &()), Some(300));
					hits.fetch_add(1, Ordering::Relaxed);
				}
			});
		}
		s.spawn(|| {
			for i in 0..64 {
				let kind = world.catalog.object_kind(&format!("filler_{i}"));
				lookup.register_for_object_kinds(constant(i), &[kind]).unwrap();
			}
		});
	});

	assert_eq!(hits.load(Ordering::Relaxed), 4_000);
	assert_eq!(lookup.object_kinds().len(), 65);
}
