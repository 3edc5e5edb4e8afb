use criterion::{Criterion, black_box, criterion_group, criterion_main};
use seqtag_core::{Context, CorpusReader, Instance, ModelConfig, OutputHeadKind, Tagger, Vocab};

const CORPUS: &[&str] = &[
    "The_DT cat_NN sat_VBD on_IN the_DT mat_NN ._.",
    "A_DT dog_NN barked_VBD at_IN 3_CD cats_NNS ._.",
    "She_PRP reads_VBZ long_JJ books_NNS ._.",
];

fn build(head: OutputHeadKind) -> Tagger {
    let reader = CorpusReader::new().unwrap();
    let mut words = Vocab::new();
    let mut tags = Vocab::new();
    for (i, line) in CORPUS.iter().enumerate() {
        let line = line.replace(' ', "\t");
        let sentence = reader.parse_annotated(&line, i + 1).unwrap().unwrap();
        Instance::admit(&sentence, &mut words, &mut tags).unwrap();
    }
    words.seal_words().unwrap();
    tags.seal_tags().unwrap();
    Tagger::new(ModelConfig::new().with_head(head), words, tags, &mut Context::new(1)).unwrap()
}

fn bench_tagging(c: &mut Criterion) {
    let sentence = ["The", "dog", "reads", "on", "the", "mat", "."];

    let greedy = build(OutputHeadKind::Softmax);
    c.bench_function("greedy_tag_7_words", |b| {
        b.iter(|| greedy.tag(black_box(&sentence)).unwrap());
    });

    let crf = build(OutputHeadKind::Crf);
    c.bench_function("crf_tag_7_words", |b| {
        b.iter(|| crf.tag(black_box(&sentence)).unwrap());
    });
}

criterion_group!(benches, bench_tagging);
criterion_main!(benches);
