//! 状态机端到端测试

use std::sync::Arc;

use anim_engine::animation::{load_graph_from_str, StateDesc, TransitionDesc};
use anim_engine::{
    AnimError, AnimationBlendTree, AnimationClip, AnimationStateGraph, AnimationSystem,
    Skeleton, SkeletonDescription,
};
use glam::{Mat4, Quat, Vec3};

fn description() -> Arc<SkeletonDescription> {
    let mut desc = SkeletonDescription::new("biped");
    let root = desc.add_joint("root", None, Quat::IDENTITY, Vec3::ZERO).unwrap();
    desc.add_joint("spine", Some(root), Quat::IDENTITY, Vec3::Y).unwrap();
    desc.compute_bind_transforms();
    Arc::new(desc)
}

/// 1 秒长的循环片段，根关节平移、脊柱旋转
fn clip(name: &str, desc: &Arc<SkeletonDescription>, direction: Vec3, angle: f32) -> Arc<AnimationClip> {
    let mut clip = AnimationClip::new(name, desc.clone(), true);
    clip.add_sample(0, 0.0, Quat::IDENTITY, Vec3::ZERO).unwrap();
    clip.add_sample(0, 1.0, Quat::IDENTITY, direction).unwrap();
    clip.add_sample(1, 0.0, Quat::IDENTITY, Vec3::Y).unwrap();
    clip.add_sample(1, 1.0, Quat::from_rotation_z(angle), Vec3::Y).unwrap();
    Arc::new(clip)
}

fn system(desc: &Arc<SkeletonDescription>) -> AnimationSystem {
    let mut system = AnimationSystem::new();
    system.add_clip(clip("idle", desc, Vec3::Z, 0.3));
    system.add_clip(clip("run", desc, Vec3::X * 4.0, 1.2));
    system
}

fn idle_run_graph() -> Arc<AnimationStateGraph> {
    let mut builder = AnimationStateGraph::builder("idle-run");
    for name in ["idle", "run"] {
        builder
            .add_state(
                StateDesc::new(name, Arc::new(AnimationBlendTree::single_clip(name, name)))
                    .looping(true),
            )
            .unwrap();
    }
    builder
        .add_transition(TransitionDesc::new(Some("idle"), "run").trigger("go").duration(0.2))
        .unwrap();
    Arc::new(builder.build().unwrap())
}

fn expected_matrices(desc: &Arc<SkeletonDescription>, clip: &AnimationClip, time: f32) -> Vec<Mat4> {
    let mut skeleton = Skeleton::new(desc.clone());
    skeleton.set_pose(&clip.get_pose(time, true)).unwrap();
    skeleton.apply_current_pose();
    skeleton.compute_skinning_matrices();
    skeleton.skinning_matrices().to_vec()
}

fn assert_matrices_eq(actual: &[Mat4], expected: &[Mat4]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!(a.abs_diff_eq(*e, 1e-5), "{a:?} != {e:?}");
    }
}

fn run_idle_to_run(system: &mut AnimationSystem, graph: &Arc<AnimationStateGraph>, desc: &Arc<SkeletonDescription>) {
    let id = system.create_instance(graph, Skeleton::new(desc.clone()));
    system.set_flag(id, "go").unwrap();
    for _ in 0..5 {
        system.process_state_updates(0.05).unwrap();
    }
    system.apply_poses_to_skeletons().unwrap();

    assert_eq!(system.current_state(id).unwrap(), graph.find_state("run").unwrap());
    assert_eq!(system.current_transition(id).unwrap(), None);
    assert!((system.state_time(id).unwrap() - 0.05).abs() < 1e-6);

    let run = system.clips().iter().find(|c| c.name() == "run").unwrap().clone();
    let expected = expected_matrices(desc, &run, 0.05);
    assert_matrices_eq(system.skeleton(id).unwrap().skinning_matrices(), &expected);
}

#[test]
fn idle_to_run_on_flag() {
    let _ = env_logger::builder().is_test(true).try_init();
    let desc = description();
    let mut system = system(&desc);
    run_idle_to_run(&mut system, &idle_run_graph(), &desc);
}

#[test]
fn idle_to_run_from_json() {
    let desc = description();
    let mut system = system(&desc);
    let graph = load_graph_from_str(
        r#"{
            "states": [
                { "id": "idle", "clip": "idle", "loop": true },
                { "id": "run", "clip": "run", "loop": true }
            ],
            "transitions": [
                { "from-id": "idle", "to-id": "run", "trigger-flag": "go", "duration": 0.2 }
            ]
        }"#,
    )
    .unwrap();
    run_idle_to_run(&mut system, &Arc::new(graph), &desc);
}

#[test]
fn transition_blends_halfway() {
    let desc = description();
    let mut system = system(&desc);
    let graph = idle_run_graph();
    let id = system.create_instance(&graph, Skeleton::new(desc.clone()));

    system.set_flag(id, "go").unwrap();
    system.process_state_updates(0.1).unwrap();
    system.process_state_updates(0.1).unwrap();
    system.apply_poses_to_skeletons().unwrap();

    // 两侧时间线冻结：idle 停在 0.1，run 从 0 开始，权重 0.5
    assert_eq!(system.current_state(id).unwrap(), 0);
    let idle = system.clips()[0].get_pose(0.1, true);
    let run = system.clips()[1].get_pose(0.0, true);
    let mut reference = Skeleton::new(desc);
    reference.set_pose(&idle.lerp(&run, 0.5).unwrap()).unwrap();
    reference.apply_current_pose();
    reference.compute_skinning_matrices();
    assert_matrices_eq(
        system.skeleton(id).unwrap().skinning_matrices(),
        reference.skinning_matrices(),
    );
}

#[test]
fn instances_are_independent() {
    let desc = description();
    let mut system = system(&desc);
    let graph = idle_run_graph();
    let a = system.create_instance(&graph, Skeleton::new(desc.clone()));
    let b = system.create_instance(&graph, Skeleton::new(desc.clone()));

    system.set_flag(a, "go").unwrap();
    for _ in 0..10 {
        system.process_state_updates(0.05).unwrap();
    }
    assert_eq!(system.current_state_name(a).unwrap(), "run");
    assert_eq!(system.current_state_name(b).unwrap(), "idle");
    assert_eq!(system.instance_count(), 2);

    let skeleton = system.destroy_instance(a).unwrap();
    assert_eq!(skeleton.joint_count(), 2);
    assert!(matches!(system.set_flag(a, "go"), Err(AnimError::InvalidInstance(_))));
    assert_eq!(system.instance_count(), 1);
}

#[test]
fn missing_clips_fall_back_to_bind_pose() {
    let desc = description();
    let mut system = AnimationSystem::new();
    let graph = idle_run_graph();
    let id = system.create_instance(&graph, Skeleton::new(desc));

    system.process_state_updates(0.3).unwrap();
    system.apply_poses_to_skeletons().unwrap();
    for matrix in system.skeleton(id).unwrap().skinning_matrices() {
        assert!(matrix.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
