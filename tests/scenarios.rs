//! End-to-end scenarios with hand-computed expectations.

use skillmodels::{
    EmbeddingConfig, EmbeddingModel, IndexedHistory, Interaction, InteractionHistory, IrtConfig,
    OneParameterLogisticModel, SkillModel, SkillModelError, StudentBiasedCoinModel,
    TwoParameterLogisticModel,
};

#[test]
fn one_dimensional_embedding() {
    let history = IndexedHistory::new(vec![Interaction::assessment("s1", "a1", 0, true)]);
    let config = EmbeddingConfig {
        embedding_dimension: 1,
        ..Default::default()
    };
    let mut model = EmbeddingModel::new(&history, config, None).unwrap();
    model.assessment_embeddings[[0, 0]] = 1.0;

    let ixn = Interaction::assessment("s1", "a1", 0, true);
    let distance = skillmodels::embedding::embedding_distance(
        model.student_embeddings.slice(ndarray::s![0, .., 0]),
        model.assessment_embeddings.row(0),
    );
    assert_eq!(distance, -1.0);

    let ll = model.assessment_outcome_log_likelihood(&ixn, None).unwrap();
    assert!((ll + (1.0 + 1f64.exp()).ln()).abs() < 1e-12);
    assert!((ll - (-1.3133)).abs() < 1e-4);

    let p = model.assessment_pass_likelihood(&ixn).unwrap();
    assert!((p - 0.2689).abs() < 1e-4);

    let batch = model.assessment_pass_likelihoods(&[ixn]).unwrap();
    assert!((batch[0] - p).abs() < 1e-12);
}

#[test]
fn biased_coin_student() {
    let history = IndexedHistory::new(vec![
        Interaction::assessment("s1", "a1", 0, true),
        Interaction::assessment("s1", "a2", 1, true),
        Interaction::assessment("s1", "a3", 2, false),
    ]);
    let filtered = history.assessment_interactions().cloned().collect::<Vec<_>>();
    let mut model = StudentBiasedCoinModel::new(&history, Some(filtered.as_slice()));
    model.fit().unwrap();

    let query = Interaction::assessment("s1", "a4", 3, true);
    let pass = model.assessment_outcome_log_likelihood(&query, None).unwrap();
    let fail = model.assessment_outcome_log_likelihood(&query, Some(false)).unwrap();
    assert!((pass - 0.6f64.ln()).abs() < 1e-12);
    assert!((pass - (-0.5108)).abs() < 1e-4);
    assert!((fail - 0.4f64.ln()).abs() < 1e-12);
    assert!((fail - (-0.9163)).abs() < 1e-4);
}

#[test]
fn invalid_embedding_configs_fail_fast() {
    let history = IndexedHistory::new(vec![Interaction::assessment("s1", "a1", 0, true)]);

    let zero_dim = EmbeddingConfig {
        embedding_dimension: 0,
        ..Default::default()
    };
    assert!(matches!(
        EmbeddingModel::new(&history, zero_dim, None),
        Err(SkillModelError::InvalidConfig { .. })
    ));

    let prereqs_without_lessons = EmbeddingConfig {
        using_lessons: false,
        using_prereqs: true,
        ..Default::default()
    };
    assert!(matches!(
        EmbeddingModel::new(&history, prereqs_without_lessons, None),
        Err(SkillModelError::InvalidConfig { .. })
    ));
}

#[test]
fn irt_models_rank_students() {
    let mut rows = Vec::new();
    for t in 0..8 {
        rows.push(Interaction::assessment("ada", "q1", t, true));
        rows.push(Interaction::assessment("ada", "q2", t, t % 4 != 0));
        rows.push(Interaction::assessment("bob", "q1", t, t % 2 == 0));
        rows.push(Interaction::assessment("bob", "q2", t, t % 4 == 0));
        rows.push(Interaction::lesson("bob", "reading", t));
    }
    let history = IndexedHistory::new(rows);
    assert_eq!(history.num_lessons(), 1);

    let ada = Interaction::assessment("ada", "q2", 0, true);
    let bob = Interaction::assessment("bob", "q2", 0, true);

    let mut one = OneParameterLogisticModel::new(&history, IrtConfig::default()).unwrap();
    one.fit().unwrap();
    assert!(
        one.assessment_pass_likelihood(&ada).unwrap()
            > one.assessment_pass_likelihood(&bob).unwrap()
    );

    let config = IrtConfig {
        select_regularization_constant: true,
        seed: 3,
        ..Default::default()
    };
    let mut two = TwoParameterLogisticModel::new(&history, config).unwrap();
    two.fit().unwrap();
    let c = two.regularization_constant().unwrap();
    assert!(two.config().regularization_candidates.contains(&c));
    assert!(
        two.assessment_pass_likelihood(&ada).unwrap()
            > two.assessment_pass_likelihood(&bob).unwrap()
    );
}
