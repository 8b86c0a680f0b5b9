//! Engine tests against a live Postgres. Run with a scratch database:
//!
//! ```text
//! DATABASE_URL=postgres://localhost/scheduler_test cargo test -- --ignored
//! ```

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::db::models::{BookingStatus, UserRole};
use crate::db::repositories::UserRepository;
use crate::scheduling::clock::SystemClock;
use crate::scheduling::engine::{Actor, BookingEngine, BookingPolicy};
use crate::scheduling::error::SchedulingError;

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for pg tests");
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("failed to connect to test database");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");
    pool
}

fn engine(pool: &PgPool) -> BookingEngine {
    BookingEngine::new(
        pool.clone(),
        Arc::new(SystemClock),
        BookingPolicy {
            cancellation_window_hours: 24,
        },
    )
}

async fn create_user(pool: &PgPool, role: UserRole, external_id: Option<&str>) -> Uuid {
    let email = format!("{}-{}@example.edu", role, Uuid::new_v4());
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, name, role, external_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(&email)
    .bind("Test User")
    .bind(role)
    .bind(external_id)
    .fetch_one(pool)
    .await
    .expect("failed to insert user");
    id
}

async fn create_slot(
    pool: &PgPool,
    faculty_id: Uuid,
    subject: &str,
    start: OffsetDateTime,
    minutes: i64,
) -> Uuid {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO slots (faculty_id, subject, start_time, end_time)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(faculty_id)
    .bind(subject)
    .bind(start)
    .bind(start + Duration::minutes(minutes))
    .fetch_one(pool)
    .await
    .expect("failed to insert slot");
    id
}

async fn booking_count_for_slot(pool: &PgPool, slot_id: Uuid) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bookings WHERE slot_id = $1")
        .bind(slot_id)
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn concurrent_claims_have_exactly_one_winner() {
    let pool = test_pool().await;
    let engine = engine(&pool);

    let faculty = create_user(&pool, UserRole::Faculty, Some("pbl-f1")).await;
    let student_a = create_user(&pool, UserRole::Student, None).await;
    let student_b = create_user(&pool, UserRole::Student, None).await;
    let start = OffsetDateTime::now_utc() + Duration::days(3);
    let slot = create_slot(&pool, faculty, "Web Development", start, 15).await;

    let (a, b) = tokio::join!(
        engine.create_booking(student_a, slot, "group-a"),
        engine.create_booking(student_b, slot, "group-b"),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|w| **w).count();
    assert_eq!(winners, 1, "exactly one racing claim must win");

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(
        loser.unwrap_err(),
        SchedulingError::SlotAlreadyBooked
    ));
    assert_eq!(booking_count_for_slot(&pool, slot).await, 1);
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn one_confirmed_booking_per_subject() {
    let pool = test_pool().await;
    let engine = engine(&pool);

    let faculty = create_user(&pool, UserRole::Faculty, Some("pbl-f2")).await;
    let student = create_user(&pool, UserRole::Student, None).await;
    let start = OffsetDateTime::now_utc() + Duration::days(3);
    let first = create_slot(&pool, faculty, "Compiler Design", start, 15).await;
    let second = create_slot(
        &pool,
        faculty,
        "Compiler Design",
        start + Duration::hours(1),
        15,
    )
    .await;

    engine
        .create_booking(student, first, "group-1")
        .await
        .expect("first booking should succeed");

    let err = engine
        .create_booking(student, second, "group-1")
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::DuplicateActiveBooking(_)));

    // Cancelling frees the subject; the old slot becomes bookable again too.
    let booking = sqlx::query_as::<_, (Uuid,)>(
        "SELECT id FROM bookings WHERE slot_id = $1 AND status = 'confirmed'",
    )
    .bind(first)
    .fetch_one(&pool)
    .await
    .unwrap();
    engine
        .cancel_booking(Actor::Student(student), booking.0, "changed plans")
        .await
        .expect("cancellation outside the window should succeed");

    engine
        .create_booking(student, second, "group-1")
        .await
        .expect("subject freed after cancellation");
    engine
        .create_booking(create_user(&pool, UserRole::Student, None).await, first, "group-2")
        .await
        .expect("cancelled slot is claimable by another student");
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn student_cancellation_respects_the_window() {
    let pool = test_pool().await;
    let engine = engine(&pool);

    let faculty = create_user(&pool, UserRole::Faculty, Some("pbl-f3")).await;
    let student = create_user(&pool, UserRole::Student, None).await;
    // Starts in 2 hours: well inside the 24h window.
    let start = OffsetDateTime::now_utc() + Duration::hours(2);
    let slot = create_slot(&pool, faculty, "Web Development", start, 15).await;

    let booking = engine
        .create_booking(student, slot, "group-w")
        .await
        .unwrap();

    let err = engine
        .cancel_booking(Actor::Student(student), booking.id, "")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SchedulingError::WithinCancellationWindow { hours: 24 }
    ));

    // Faculty override is not bound by the window.
    let cancelled = engine
        .cancel_booking(Actor::Faculty(faculty), booking.id, "student request")
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason, "student request");
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn absence_blocks_the_subject_until_rebooking_is_allowed() {
    let pool = test_pool().await;
    let engine = engine(&pool);

    let faculty = create_user(&pool, UserRole::Faculty, Some("pbl-f4")).await;
    let student = create_user(&pool, UserRole::Student, None).await;
    let start = OffsetDateTime::now_utc() + Duration::days(2);
    let slot = create_slot(&pool, faculty, "Web Development", start, 15).await;
    let later = create_slot(
        &pool,
        faculty,
        "Web Development",
        start + Duration::days(1),
        15,
    )
    .await;

    let booking = engine
        .create_booking(student, slot, "group-x")
        .await
        .unwrap();

    let absent = engine.mark_absent(faculty, booking.id).await.unwrap();
    assert_eq!(absent.status, BookingStatus::Absent);
    assert!(absent.marked_absent_at.is_some());
    assert!(!absent.rebooking_allowed);

    let err = engine
        .create_booking(student, later, "group-x")
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::SubjectBlocked(_)));

    // Only faculty action on that specific record lifts the block.
    engine.allow_rebooking(faculty, booking.id).await.unwrap();
    engine
        .create_booking(student, later, "group-x")
        .await
        .expect("subject unblocked after allow_rebooking");
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn busy_faculty_rejects_new_bookings() {
    let pool = test_pool().await;
    let engine = engine(&pool);

    let faculty = create_user(&pool, UserRole::Faculty, Some("pbl-f5")).await;
    let student = create_user(&pool, UserRole::Student, None).await;
    let start = OffsetDateTime::now_utc() + Duration::days(1);
    let slot = create_slot(&pool, faculty, "Compiler Design", start, 15).await;

    UserRepository::set_availability(&pool, faculty, false)
        .await
        .unwrap();

    let err = engine
        .create_booking(student, slot, "group-z")
        .await
        .unwrap_err();
    assert!(matches!(err, SchedulingError::FacultyUnavailable));

    UserRepository::set_availability(&pool, faculty, true)
        .await
        .unwrap();
    engine
        .create_booking(student, slot, "group-z")
        .await
        .expect("booking succeeds once faculty is available again");
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn bulk_create_skips_overlaps_and_persists_the_rest() {
    use crate::scheduling::generator::SlotPlan;
    use crate::scheduling::slots::SlotService;

    let pool = test_pool().await;
    let faculty = create_user(&pool, UserRole::Faculty, Some("pbl-f7")).await;
    let service = SlotService::new(pool.clone(), Arc::new(SystemClock));

    // Pin the faculty's subject via an existing slot, then lay a second slot
    // on top of what will be the middle candidate of the bulk range.
    let day = OffsetDateTime::now_utc() + Duration::days(5);
    let range_start = day.replace_time(time::macros::time!(09:00));
    create_slot(&pool, faculty, "Web Development", range_start - Duration::days(1), 15).await;
    create_slot(
        &pool,
        faculty,
        "Web Development",
        range_start + Duration::minutes(25),
        10,
    )
    .await;

    let plan = SlotPlan {
        start_time: range_start,
        end_time: range_start + Duration::hours(1),
        slot_duration_minutes: 15,
        break_duration_minutes: 5,
    };
    let created = service.bulk_create(faculty, &plan).await.unwrap();

    // Candidates are 09:00, 09:20, 09:40; the 09:25-09:35 slot knocks out
    // the middle one.
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].start_time, range_start);
    assert_eq!(created[1].start_time, range_start + Duration::minutes(40));

    // No overlapping pair may exist among the faculty's persisted slots.
    let (overlaps,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM slots a
        JOIN slots b ON a.faculty_id = b.faculty_id AND a.id < b.id
            AND a.start_time < b.end_time AND a.end_time > b.start_time
        WHERE a.faculty_id = $1
        "#,
    )
    .bind(faculty)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(overlaps, 0);
}

#[tokio::test]
#[ignore = "requires Postgres via DATABASE_URL"]
async fn state_errors_leave_no_side_effects() {
    let pool = test_pool().await;
    let engine = engine(&pool);

    let faculty = create_user(&pool, UserRole::Faculty, Some("pbl-f6")).await;
    let student = create_user(&pool, UserRole::Student, None).await;
    let start = OffsetDateTime::now_utc() + Duration::days(2);
    let slot = create_slot(&pool, faculty, "Web Development", start, 15).await;

    let booking = engine
        .create_booking(student, slot, "group-s")
        .await
        .unwrap();
    engine
        .cancel_booking(Actor::Faculty(faculty), booking.id, "")
        .await
        .unwrap();

    // Completing a cancelled booking is a state error and changes nothing.
    let err = engine.complete_booking(faculty, booking.id).await.unwrap_err();
    assert!(matches!(err, SchedulingError::NotConfirmed { .. }));

    let (status,): (BookingStatus,) =
        sqlx::query_as("SELECT status FROM bookings WHERE id = $1")
            .bind(booking.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, BookingStatus::Cancelled);
}
