/// Integration tests against a real PostgreSQL database
///
/// Run with `DATABASE_URL` set:
///
/// ```bash
/// cargo test -p habits-api -- --ignored
/// ```

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_json, json_request, send, TestContext};
use habits_shared::models::{
    contest::{Contest, ContestInput},
    contest_task::{ContestTask, CreateContestTask},
    goal::{CreateGoal, Goal},
    personal_task::{CreatePersonalTask, PersonalTask},
    task::TaskStatus,
    team::{CreateTeam, Team},
    team_member::{TeamMember, TeamRole},
    user::UserRole,
};
use serde_json::json;
use uuid::Uuid;

async fn count(ctx: &TestContext, sql: &str, id: Uuid) -> i64 {
    sqlx::query_scalar(sql).bind(id).fetch_one(&ctx.db).await.unwrap()
}

async fn notifications_of_kind(ctx: &TestContext, user_id: Uuid, kind: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND type = $2")
        .bind(user_id)
        .bind(kind)
        .fetch_one(&ctx.db)
        .await
        .unwrap()
}

async fn personal_task(ctx: &TestContext, user_id: Uuid, task_type: &str, goal: f64) -> PersonalTask {
    PersonalTask::create(
        &ctx.db,
        CreatePersonalTask {
            user_id,
            name: format!("{task_type} habit"),
            description: None,
            task_type: task_type.to_string(),
            goal_number: goal,
            due_date: None,
            is_recurring: false,
            recurrence_pattern: None,
        },
    )
    .await
    .unwrap()
}

/// A team captained by `captain_id`, with `members` added as plain members
async fn team_with_members(ctx: &TestContext, captain_id: Uuid, members: &[Uuid]) -> Team {
    let mut tx = ctx.db.begin().await.unwrap();
    let team = Team::create_with_captain(
        &mut *tx,
        CreateTeam {
            name: format!("Team {}", Uuid::new_v4()),
            company: "Acme".to_string(),
            description: None,
            avatar_url: None,
        },
        captain_id,
    )
    .await
    .unwrap();
    for member in members {
        TeamMember::add(&mut *tx, team.id, *member, TeamRole::Member)
            .await
            .unwrap();
    }
    tx.commit().await.unwrap();
    team
}

/// A running contest between `team_ids` with one task of `task_type`
async fn contest_with_task(
    ctx: &TestContext,
    admin_id: Uuid,
    team_ids: Vec<Uuid>,
    task_type: &str,
    goal: f64,
) -> (Contest, ContestTask) {
    let today = Utc::now().date_naive();
    let mut tx = ctx.db.begin().await.unwrap();
    let contest = Contest::create(
        &mut *tx,
        ContestInput {
            name: format!("{task_type} challenge"),
            description: None,
            start_date: today - Duration::days(1),
            end_date: today + Duration::days(30),
            team_ids,
        },
        admin_id,
        today,
    )
    .await
    .unwrap();
    let task = ContestTask::create_and_seed(
        &mut *tx,
        CreateContestTask {
            contest_id: contest.id,
            name: format!("{task_type} target"),
            description: None,
            task_type: task_type.to_string(),
            goal_number: goal,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();
    (contest, task)
}

async fn contest_progress(ctx: &TestContext, task_id: Uuid, user_id: Uuid) -> f64 {
    sqlx::query_scalar(
        "SELECT current_progress FROM contest_task_progress WHERE contest_task_id = $1 AND user_id = $2",
    )
    .bind(task_id)
    .bind(user_id)
    .fetch_one(&ctx.db)
    .await
    .unwrap()
}

async fn team_credits(ctx: &TestContext, contest_id: Uuid, team_id: Uuid) -> i32 {
    sqlx::query_scalar(
        "SELECT completed_tasks FROM contest_teams WHERE contest_id = $1 AND team_id = $2",
    )
    .bind(contest_id)
    .bind(team_id)
    .fetch_one(&ctx.db)
    .await
    .unwrap()
}

async fn goal_value(ctx: &TestContext, goal_id: Uuid) -> f64 {
    sqlx::query_scalar("SELECT current_value FROM goals WHERE id = $1")
        .bind(goal_id)
        .fetch_one(&ctx.db)
        .await
        .unwrap()
}

async fn team_goal(ctx: &TestContext, team_id: Uuid, name: &str, target: f64) -> Goal {
    let today = Utc::now().date_naive();
    Goal::create(
        &ctx.db,
        CreateGoal {
            team_id,
            name: name.to_string(),
            description: None,
            target_value: target,
            unit: "units".to_string(),
            start_date: today,
            end_date: today + Duration::days(30),
        },
    )
    .await
    .unwrap()
}

fn report(task_type: &str, amount: f64) -> serde_json::Value {
    json!({ "taskType": task_type, "goalNumber": amount })
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_report_completes_personal_task_once() {
    let mut ctx = TestContext::new().await.unwrap();
    let (user, cookie) = ctx.user(UserRole::Member).await.unwrap();

    let task = PersonalTask::create(
        &ctx.db,
        CreatePersonalTask {
            user_id: user.id,
            name: "Morning run".to_string(),
            description: None,
            task_type: "Exercise".to_string(),
            goal_number: 5.0,
            due_date: None,
            is_recurring: false,
            recurrence_pattern: None,
        },
    )
    .await
    .unwrap();

    let report = json!({ "taskType": "Exercise", "goalNumber": 5 });
    let response = send(&ctx.app, json_request("POST", "/api/tasks/report", Some(&cookie), report.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["refresh"], true);

    // Past the goal: nothing is completed a second time
    let response = send(&ctx.app, json_request("POST", "/api/tasks/report", Some(&cookie), report)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let tasks = PersonalTask::list_for_user(&ctx.db, user.id).await.unwrap();
    let stored = tasks.iter().find(|t| t.id == task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.current_progress, 5.0);

    assert_eq!(
        count(&ctx, "SELECT COUNT(*) FROM completed_tasks WHERE user_id = $1", user.id).await,
        1
    );
    assert_eq!(
        count(
            &ctx,
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND type = 'task_completed'",
            user.id
        )
        .await,
        1
    );

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_joining_team_twice_fails() {
    let mut ctx = TestContext::new().await.unwrap();
    let (captain, _) = ctx.user(UserRole::Captain).await.unwrap();
    let (_, member_cookie) = ctx.user(UserRole::Member).await.unwrap();

    let mut tx = ctx.db.begin().await.unwrap();
    let team = Team::create_with_captain(
        &mut *tx,
        CreateTeam {
            name: format!("Walkers {}", Uuid::new_v4()),
            company: "Acme".to_string(),
            description: None,
            avatar_url: None,
        },
        captain.id,
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let join = json!({ "code": team.code.to_lowercase() });
    let response = send(&ctx.app, json_request("POST", "/api/teams/join", Some(&member_cookie), join.clone())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["role"], "member");

    let response = send(&ctx.app, json_request("POST", "/api/teams/join", Some(&member_cookie), join)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("already a member"));

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_contest_delete_cascades() {
    let mut ctx = TestContext::new().await.unwrap();
    let (admin, admin_cookie) = ctx.user(UserRole::Admin).await.unwrap();
    let (captain, _) = ctx.user(UserRole::Captain).await.unwrap();

    let today = Utc::now().date_naive();
    let mut tx = ctx.db.begin().await.unwrap();
    let team = Team::create_with_captain(
        &mut *tx,
        CreateTeam {
            name: format!("Sleepers {}", Uuid::new_v4()),
            company: "Acme".to_string(),
            description: None,
            avatar_url: None,
        },
        captain.id,
    )
    .await
    .unwrap();
    let contest = Contest::create(
        &mut *tx,
        ContestInput {
            name: "Sleep month".to_string(),
            description: None,
            start_date: today,
            end_date: today + Duration::days(30),
            team_ids: vec![team.id],
        },
        admin.id,
        today,
    )
    .await
    .unwrap();
    ContestTask::create_and_seed(
        &mut *tx,
        CreateContestTask {
            contest_id: contest.id,
            name: "Eight hours".to_string(),
            description: None,
            task_type: "Sleep".to_string(),
            goal_number: 8.0,
        },
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    let seeded = count(
        &ctx,
        "SELECT COUNT(*) FROM contest_task_progress p JOIN contest_tasks t ON t.id = p.contest_task_id WHERE t.contest_id = $1",
        contest.id,
    )
    .await;
    assert_eq!(seeded, 1, "the captain gets a zero progress row");

    let response = send(
        &ctx.app,
        json_request("DELETE", &format!("/api/contests/{}", contest.id), Some(&admin_cookie), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    for sql in [
        "SELECT COUNT(*) FROM contests WHERE id = $1",
        "SELECT COUNT(*) FROM contest_teams WHERE contest_id = $1",
        "SELECT COUNT(*) FROM contest_tasks WHERE contest_id = $1",
    ] {
        assert_eq!(count(&ctx, sql, contest.id).await, 0, "{sql}");
    }
    assert_eq!(
        count(&ctx, "SELECT COUNT(*) FROM contest_task_progress WHERE user_id = $1", captain.id).await,
        0
    );

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_report_credits_team_goal_named_after_type() {
    let mut ctx = TestContext::new().await.unwrap();
    let (captain, _) = ctx.user(UserRole::Captain).await.unwrap();
    let (member, cookie) = ctx.user(UserRole::Member).await.unwrap();

    let team = team_with_members(&ctx, captain.id, &[member.id]).await;
    let water = team_goal(&ctx, team.id, "Water", 10.0).await;
    let sleep = team_goal(&ctx, team.id, "Sleep", 10.0).await;

    for amount in [2.0, 1.5] {
        let response = send(&ctx.app, json_request("POST", "/api/tasks/report", Some(&cookie), report("Water", amount))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(goal_value(&ctx, water.id).await, 3.5);
    assert_eq!(goal_value(&ctx, sleep.id).await, 0.0);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_report_settles_contest_completion_once() {
    let mut ctx = TestContext::new().await.unwrap();
    let (admin, _) = ctx.user(UserRole::Admin).await.unwrap();
    let (captain, _) = ctx.user(UserRole::Captain).await.unwrap();
    let (member, cookie) = ctx.user(UserRole::Member).await.unwrap();

    let team = team_with_members(&ctx, captain.id, &[member.id]).await;
    let (contest, task) = contest_with_task(&ctx, admin.id, vec![team.id], "Sleep", 3.0).await;

    let response = send(&ctx.app, json_request("POST", "/api/tasks/report", Some(&cookie), report("Sleep", 2.0))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(contest_progress(&ctx, task.id, member.id).await, 2.0);
    assert_eq!(notifications_of_kind(&ctx, member.id, "contest_task_completed").await, 0);
    assert_eq!(team_credits(&ctx, contest.id, team.id).await, 0);

    // Crossing the goal and going past it settle the completion only once
    for _ in 0..2 {
        let response = send(&ctx.app, json_request("POST", "/api/tasks/report", Some(&cookie), report("Sleep", 2.0))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(contest_progress(&ctx, task.id, member.id).await, 6.0);
    assert_eq!(notifications_of_kind(&ctx, member.id, "contest_task_completed").await, 1);
    assert_eq!(team_credits(&ctx, contest.id, team.id).await, 1);

    let sent: bool = sqlx::query_scalar(
        "SELECT notification_sent FROM contest_task_progress WHERE contest_task_id = $1 AND user_id = $2",
    )
    .bind(task.id)
    .bind(member.id)
    .fetch_one(&ctx.db)
    .await
    .unwrap();
    assert!(sent);

    // The captain's seeded row is untouched by the member's reports
    assert_eq!(contest_progress(&ctx, task.id, captain.id).await, 0.0);

    ctx.cleanup().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_reports_complete_contest_task_once() {
    const REPORTS: usize = 8;

    let mut ctx = TestContext::new().await.unwrap();
    let (admin, _) = ctx.user(UserRole::Admin).await.unwrap();
    let (first_captain, _) = ctx.user(UserRole::Captain).await.unwrap();
    let (second_captain, _) = ctx.user(UserRole::Captain).await.unwrap();
    let (member, cookie) = ctx.user(UserRole::Member).await.unwrap();

    let first = team_with_members(&ctx, first_captain.id, &[member.id]).await;
    let second = team_with_members(&ctx, second_captain.id, &[member.id]).await;
    let goal = team_goal(&ctx, first.id, "Steps", 100.0).await;
    let (contest, task) =
        contest_with_task(&ctx, admin.id, vec![first.id, second.id], "Steps", 3.0).await;

    let mut reports = tokio::task::JoinSet::new();
    for _ in 0..REPORTS {
        let app = ctx.app.clone();
        let request = json_request("POST", "/api/tasks/report", Some(&cookie), report("Steps", 1.0));
        reports.spawn(async move { send(&app, request).await.status() });
    }
    while let Some(status) = reports.join_next().await {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }

    assert_eq!(contest_progress(&ctx, task.id, member.id).await, REPORTS as f64);
    assert_eq!(goal_value(&ctx, goal.id).await, REPORTS as f64);
    assert_eq!(notifications_of_kind(&ctx, member.id, "contest_task_completed").await, 1);
    assert_eq!(team_credits(&ctx, contest.id, first.id).await, 1);
    assert_eq!(team_credits(&ctx, contest.id, second.id).await, 1);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_badge_unlocked_and_notified_once() {
    let mut ctx = TestContext::new().await.unwrap();
    let (user, cookie) = ctx.user(UserRole::Member).await.unwrap();

    for _ in 0..5 {
        personal_task(&ctx, user.id, "Exercise", 1.0).await;
    }

    // One report completes all five open tasks
    let response = send(&ctx.app, json_request("POST", "/api/tasks/report", Some(&cookie), report("Exercise", 1.0))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let unlocked: Vec<&str> = body["unlockedBadges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|badge| badge["name"].as_str().unwrap())
        .collect();
    assert_eq!(unlocked, vec!["Exercise Novice"]);

    personal_task(&ctx, user.id, "Exercise", 1.0).await;
    let response = send(&ctx.app, json_request("POST", "/api/tasks/report", Some(&cookie), report("Exercise", 1.0))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["unlockedBadges"], json!([]));

    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM completed_tasks WHERE user_id = $1", user.id).await, 6);
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM user_badges WHERE user_id = $1", user.id).await, 1);
    assert_eq!(notifications_of_kind(&ctx, user.id, "badge_unlocked").await, 1);
    assert_eq!(notifications_of_kind(&ctx, user.id, "task_completed").await, 6);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_contest_progress_put_reports_task_completed() {
    let mut ctx = TestContext::new().await.unwrap();
    let (admin, _) = ctx.user(UserRole::Admin).await.unwrap();
    let (captain, _) = ctx.user(UserRole::Captain).await.unwrap();
    let (member, cookie) = ctx.user(UserRole::Member).await.unwrap();
    let (_, outsider_cookie) = ctx.user(UserRole::Member).await.unwrap();

    let team = team_with_members(&ctx, captain.id, &[member.id]).await;
    let (contest, task) = contest_with_task(&ctx, admin.id, vec![team.id], "Water", 3.0).await;
    let put = |amount: f64| json!({ "taskId": task.id, "progress": amount });

    let response = send(&ctx.app, json_request("PUT", "/api/tasks/contest", Some(&cookie), put(2.0))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["current_progress"], 2.0);
    assert_eq!(body["taskCompleted"], false);

    let uri = format!("/api/teams/{}/contest-tasks", team.id);
    let response = send(&ctx.app, json_request("PUT", &uri, Some(&cookie), put(1.0))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["current_progress"], 3.0);
    assert_eq!(body["taskCompleted"], true);

    let response = send(&ctx.app, json_request("PUT", "/api/tasks/contest", Some(&cookie), put(1.0))).await;
    let body = body_json(response).await;
    assert_eq!(body["taskCompleted"], true);

    assert_eq!(notifications_of_kind(&ctx, member.id, "contest_task_completed").await, 1);
    assert_eq!(team_credits(&ctx, contest.id, team.id).await, 1);

    let response = send(&ctx.app, json_request("PUT", "/api/tasks/contest", Some(&outsider_cookie), put(1.0))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = send(
        &ctx.app,
        json_request("PUT", "/api/tasks/contest", Some(&cookie), json!({ "taskId": Uuid::new_v4(), "progress": 1 })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_personal_task_edit_reaching_goal_records_completion_once() {
    let mut ctx = TestContext::new().await.unwrap();
    let (user, cookie) = ctx.user(UserRole::Member).await.unwrap();
    let task = personal_task(&ctx, user.id, "Water", 8.0).await;

    let edit = |progress: f64, status: &str| {
        json!({
            "id": task.id,
            "name": "Eight glasses",
            "type": "Water",
            "goalNumber": 8,
            "currentProgress": progress,
            "status": status,
        })
    };

    let response = send(&ctx.app, json_request("PUT", "/api/personal-tasks", Some(&cookie), edit(4.0, "completed"))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "in_progress");
    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM completed_tasks WHERE user_id = $1", user.id).await, 0);

    // Reaching the goal completes the task whatever status was sent
    for _ in 0..2 {
        let response = send(&ctx.app, json_request("PUT", "/api/personal-tasks", Some(&cookie), edit(8.0, "in_progress"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["unlockedBadges"], json!([]));
    }

    assert_eq!(count(&ctx, "SELECT COUNT(*) FROM completed_tasks WHERE user_id = $1", user.id).await, 1);
    assert_eq!(notifications_of_kind(&ctx, user.id, "task_completed").await, 1);

    let response = send(
        &ctx.app,
        json_request("PUT", "/api/personal-tasks", Some(&cookie), json!({
            "id": Uuid::new_v4(),
            "name": "Missing",
            "type": "Water",
            "goalNumber": 1,
            "currentProgress": 0,
            "status": "pending",
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}
