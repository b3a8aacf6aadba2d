/// Toy concept space: nine short documents, reduced to three concepts.
/// Trains a model, projects a few queries, then saves and reloads it.
use conceptspace::builder::ConceptModelBuilder;
use conceptspace::core::SparseVector;
use conceptspace::model::ConceptModel;
use conceptspace::titles::DocumentTitles;
use std::collections::BTreeMap;

const TEXTS: [&str; 9] = [
    "human interface computer",
    "survey user computer system response time",
    "eps user interface system",
    "system human system eps",
    "user response time",
    "trees",
    "graph trees",
    "graph minors trees",
    "graph minors survey",
];

const TITLES: [&str; 9] = [
    "human interface",
    "computer systems",
    "eps",
    "human systems",
    "response time",
    "trees",
    "graph",
    "minors trees",
    "minors survey",
];

struct Vocabulary {
    ids: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl Vocabulary {
    fn fit(texts: &[&str]) -> Self {
        let mut ids = BTreeMap::new();
        let mut df: Vec<usize> = Vec::new();
        for text in texts {
            let mut seen = Vec::new();
            for token in text.split_whitespace() {
                let next = ids.len();
                let id = *ids.entry(token.to_string()).or_insert(next);
                if id == df.len() {
                    df.push(0);
                }
                if !seen.contains(&id) {
                    seen.push(id);
                    df[id] += 1;
                }
            }
        }
        let n = texts.len() as f64;
        let idf = df.iter().map(|&d| (n / d as f64).log2()).collect();
        Self { ids, idf }
    }

    fn tfidf(&self, text: &str) -> SparseVector {
        SparseVector::from_pairs(
            text.split_whitespace()
                .filter_map(|t| self.ids.get(t))
                .map(|&id| (id, self.idf[id])),
        )
        .normalised()
    }
}

fn print_concepts(model: &ConceptModel, label: &str, concepts: &SparseVector) {
    println!("{}:", label);
    let mut ranked: Vec<(usize, f64)> = concepts.iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    match model.get_concept_titles(ranked) {
        Ok(titled) => {
            for (title, w) in titled {
                println!("  {:>7.4}  {}", w, title);
            }
        }
        Err(e) => println!("  error: {}", e),
    }
}

fn main() -> conceptspace::errors::Result<()> {
    let vocab = Vocabulary::fit(&TEXTS);
    let corpus: Vec<SparseVector> = TEXTS.iter().map(|t| vocab.tfidf(t)).collect();
    let titles: DocumentTitles = TITLES.iter().copied().collect();

    let model = ConceptModelBuilder::new()
        .with_num_clusters(3)
        .with_seed(2024)
        .build(&corpus, &titles)?;

    let training = model.training();
    println!(
        "Trained {} concepts from {} documents ({} iterations, converged: {}, seed {})",
        model.num_concepts(),
        training.num_documents,
        training.iterations,
        training.converged,
        training.seed
    );
    println!("Concepts:\n{}\n", model);

    for query in ["graph trees", "user interface", "survey time"] {
        print_concepts(&model, query, &model.project(&vocab.tfidf(query)));
    }

    let dir = std::env::temp_dir().join("conceptspace-demo");
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("toy.concepts");
    model.save(&path)?;

    let restored = ConceptModel::load(&path)?;
    println!(
        "\nReloaded from {} (memory-mapped: {})",
        path.display(),
        restored.is_memory_mapped()
    );
    print_concepts(&restored, "graph trees", &restored.project(&vocab.tfidf("graph trees")));

    Ok(())
}
